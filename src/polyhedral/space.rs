//! Polyhedral spaces define the dimensions of sets and maps.
//!
//! A space describes the structure of an iteration domain or map:
//! - Input dimensions (for maps) and their tuple identity
//! - Output dimensions (set dimensions) and their tuple identity
//! - Parameter dimensions (symbolic constants)

use crate::polyhedral::id::TupleId;
use serde::Serialize;
use std::fmt;

/// A polyhedral space describes the dimensionality and structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Space {
    /// Number of set/output dimensions
    pub n_dim: usize,
    /// Number of parameter dimensions
    pub n_param: usize,
    /// Number of input dimensions (for maps only)
    pub n_in: usize,
    /// Names of set/output dimensions (optional)
    pub dim_names: Vec<String>,
    /// Names of input dimensions (optional)
    pub in_names: Vec<String>,
    /// Names of parameters
    pub param_names: Vec<String>,
    /// Identity of the set/output tuple
    pub tuple: Option<TupleId>,
    /// Identity of the input tuple (maps only)
    pub in_tuple: Option<TupleId>,
}

impl Space {
    /// Create a new set space with the given dimensions.
    pub fn set(n_dim: usize) -> Self {
        Self::set_with_params(n_dim, 0)
    }

    /// Create a new set space with parameters.
    pub fn set_with_params(n_dim: usize, n_param: usize) -> Self {
        Self {
            n_dim,
            n_param,
            n_in: 0,
            dim_names: Vec::new(),
            in_names: Vec::new(),
            param_names: Vec::new(),
            tuple: None,
            in_tuple: None,
        }
    }

    /// Create a new map space.
    pub fn map(n_in: usize, n_out: usize) -> Self {
        Self::map_with_params(n_in, n_out, 0)
    }

    /// Create a new map space with parameters.
    pub fn map_with_params(n_in: usize, n_out: usize, n_param: usize) -> Self {
        Self {
            n_in,
            ..Self::set_with_params(n_out, n_param)
        }
    }

    /// Check if this is a set space (no input dimensions).
    pub fn is_set(&self) -> bool {
        self.n_in == 0 && self.in_tuple.is_none()
    }

    /// Check if this is a map space.
    pub fn is_map(&self) -> bool {
        !self.is_set()
    }

    /// Get the number of output/set dimensions.
    pub fn dim(&self) -> usize {
        self.n_dim
    }

    /// Get the total number of variable dimensions (inputs and outputs).
    pub fn total_dim(&self) -> usize {
        self.n_in + self.n_dim
    }

    /// Set dimension names.
    pub fn with_dim_names(mut self, names: Vec<String>) -> Self {
        self.dim_names = names;
        self
    }

    /// Set input dimension names.
    pub fn with_in_names(mut self, names: Vec<String>) -> Self {
        self.in_names = names;
        self
    }

    /// Set parameter names.
    pub fn with_param_names(mut self, names: Vec<String>) -> Self {
        self.n_param = names.len();
        self.param_names = names;
        self
    }

    /// Set the output tuple identity.
    pub fn with_tuple(mut self, id: Option<TupleId>) -> Self {
        self.tuple = id;
        self
    }

    /// Set the input tuple identity.
    pub fn with_in_tuple(mut self, id: Option<TupleId>) -> Self {
        self.in_tuple = id;
        self
    }

    /// Get the name of a dimension.
    pub fn dim_name(&self, idx: usize) -> Option<&str> {
        self.dim_names.get(idx).map(|s| s.as_str())
    }

    /// Get all dimension names with defaults.
    pub fn all_dim_names(&self) -> Vec<String> {
        default_names(&self.dim_names, self.n_dim, "i")
    }

    /// Get all input dimension names with defaults.
    pub fn all_in_names(&self) -> Vec<String> {
        default_names(&self.in_names, self.n_in, "i")
    }

    /// Get all parameter names with defaults.
    pub fn all_param_names(&self) -> Vec<String> {
        default_names(&self.param_names, self.n_param, "p")
    }

    /// Create the domain space from a map space.
    pub fn domain(&self) -> Space {
        Space {
            n_dim: self.n_in,
            n_in: 0,
            dim_names: self.in_names.clone(),
            in_names: Vec::new(),
            tuple: self.in_tuple.clone(),
            in_tuple: None,
            ..self.clone()
        }
    }

    /// Create the range space from a map space.
    pub fn range(&self) -> Space {
        Space {
            n_in: 0,
            in_names: Vec::new(),
            in_tuple: None,
            ..self.clone()
        }
    }

    /// Swap the input and output tuples.
    pub fn reverse(&self) -> Space {
        Space {
            n_dim: self.n_in,
            n_in: self.n_dim,
            dim_names: self.in_names.clone(),
            in_names: self.dim_names.clone(),
            tuple: self.in_tuple.clone(),
            in_tuple: self.tuple.clone(),
            ..self.clone()
        }
    }

    /// Build a map space from a domain set space and a range set space.
    pub fn map_from(domain: &Space, range: &Space) -> Space {
        Space {
            n_dim: range.n_dim,
            n_param: domain.n_param,
            n_in: domain.n_dim,
            dim_names: range.dim_names.clone(),
            in_names: domain.dim_names.clone(),
            param_names: domain.param_names.clone(),
            tuple: range.tuple.clone(),
            in_tuple: domain.tuple.clone(),
        }
    }
}

fn default_names(names: &[String], n: usize, prefix: &str) -> Vec<String> {
    (0..n)
        .map(|i| {
            names.get(i)
                .cloned()
                .unwrap_or_else(|| format!("{}{}", prefix, i))
        })
        .collect()
}

fn write_tuple(f: &mut fmt::Formatter<'_>, id: &Option<TupleId>, names: &[String]) -> fmt::Result {
    if let Some(id) = id {
        write!(f, "{}", id)?;
    }
    write!(f, "[{}]", names.join(", "))
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.param_names.is_empty() {
            write!(f, "[{}] -> ", self.param_names.join(", "))?;
        }
        write!(f, "{{ ")?;
        if self.is_map() {
            write_tuple(f, &self.in_tuple, &self.all_in_names())?;
            write!(f, " -> ")?;
        }
        write_tuple(f, &self.tuple, &self.all_dim_names())?;
        write!(f, " }}")
    }
}
