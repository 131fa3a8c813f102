//! Text output helpers for generated code.

use std::fmt;

/// An indenting text sink for generated code.
#[derive(Debug)]
pub struct CodeFormatter {
    output: String,
    indent_level: usize,
    indent_str: String,
    at_line_start: bool,
}

impl CodeFormatter {
    /// Create a new formatter with the given indent string.
    pub fn new(indent_str: &str) -> Self {
        Self {
            output: String::new(),
            indent_level: 0,
            indent_str: indent_str.to_string(),
            at_line_start: true,
        }
    }

    /// Create a formatter indenting by `width` spaces.
    pub fn with_width(width: usize) -> Self {
        Self::new(&" ".repeat(width))
    }

    /// Create a formatter with default settings (2 spaces).
    pub fn default_indent() -> Self {
        Self::with_width(2)
    }

    /// Increase indentation level.
    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    /// Decrease indentation level.
    pub fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    /// Write text.
    pub fn write(&mut self, s: &str) {
        for c in s.chars() {
            if c == '\n' {
                self.output.push('\n');
                self.at_line_start = true;
            } else {
                if self.at_line_start {
                    for _ in 0..self.indent_level {
                        self.output.push_str(&self.indent_str);
                    }
                    self.at_line_start = false;
                }
                self.output.push(c);
            }
        }
    }

    /// Write a line.
    pub fn writeln(&mut self, s: &str) {
        self.write(s);
        self.write("\n");
    }

    /// Write a block with braces.
    pub fn block<E, F>(&mut self, header: &str, f: F) -> Result<(), E>
    where
        F: FnOnce(&mut Self) -> Result<(), E>,
    {
        self.write(header);
        self.writeln(" {");
        self.indent();
        let res = f(self);
        self.dedent();
        self.writeln("}");
        res
    }

    /// Write `header` and run `f` one level deeper, without braces.
    pub fn nested<E, F>(&mut self, header: &str, f: F) -> Result<(), E>
    where
        F: FnOnce(&mut Self) -> Result<(), E>,
    {
        self.writeln(header);
        self.indent();
        let res = f(self);
        self.dedent();
        res
    }

    /// Get the formatted output.
    pub fn finish(self) -> String {
        self.output
    }

    /// Get a reference to the current output.
    pub fn output(&self) -> &str {
        &self.output
    }
}

impl fmt::Write for CodeFormatter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s);
        Ok(())
    }
}

/// Format a list with separators.
pub fn format_list<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_formatter() {
        let mut fmt = CodeFormatter::default_indent();
        fmt.writeln("{");
        fmt.indent();
        fmt.writeln("S(c0);");
        fmt.dedent();
        fmt.writeln("}");
        assert_eq!(fmt.finish(), "{\n  S(c0);\n}\n");
    }

    #[test]
    fn test_block_and_nested() {
        let mut fmt = CodeFormatter::with_width(4);
        let res: Result<(), ()> = fmt.block("for (int c0 = 0; c0 <= 9; c0 += 1)", |f| {
            f.nested("if (c0 >= 1)", |f| {
                f.writeln("A[c0] = 0;");
                Ok(())
            })
        });
        assert!(res.is_ok());
        assert_eq!(
            fmt.finish(),
            "for (int c0 = 0; c0 <= 9; c0 += 1) {\n    if (c0 >= 1)\n        A[c0] = 0;\n}\n"
        );
    }

    #[test]
    fn test_format_list() {
        assert_eq!(format_list(&[1, 2, 3], ", "), "1, 2, 3");
    }
}
