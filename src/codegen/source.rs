//! The generated source text.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Generated C code. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CSource {
    text: String,
}

impl CSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// The code in a highlighted `<pre>` block, HTML-escaped.
    pub fn to_html(&self) -> String {
        format!("<pre class='code'><code class=\"cpp hljs\">{}</code></pre>", escape_html(&self.text))
    }

    /// Write the code to `path`, replacing any existing file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::write(path, &self.text)
    }
}

/// Markdown: the code in a fenced `c` block.
impl fmt::Display for CSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "```c\n{}```", self.text)?;
        Ok(())
    }
}

impl AsRef<str> for CSource {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown() {
        let src = CSource::new("S(c0);\n");
        assert_eq!(src.to_string(), "```c\nS(c0);\n```");
    }

    #[test]
    fn test_html_is_escaped() {
        let src = CSource::new("if (c0 <= 2 && c1 > 0)\n");
        assert_eq!(
            src.to_html(),
            "<pre class='code'><code class=\"cpp hljs\">if (c0 &lt;= 2 &amp;&amp; c1 &gt; 0)\n</code></pre>"
        );
    }

    #[test]
    fn test_write_to() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.c");
        CSource::new("S();\n").write_to(&path).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "S();\n");
    }
}
