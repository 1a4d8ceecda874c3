//! The `Greeter` capability published by the `greeter` plugin.
//!
//! Providers and consumers both depend on this crate, so the capability's
//! type identity is the same on both sides of the object pool.

/// Something that can greet by name.
pub trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

/// Greeter with a fixed salutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalutationGreeter {
    salutation: String,
}

impl SalutationGreeter {
    pub fn new(salutation: impl Into<String>) -> Self {
        Self {
            salutation: salutation.into(),
        }
    }

    pub fn salutation(&self) -> &str {
        &self.salutation
    }
}

impl Default for SalutationGreeter {
    fn default() -> Self {
        Self::new("Hello")
    }
}

impl Greeter for SalutationGreeter {
    fn greet(&self, name: &str) -> String {
        format!("{}, {}!", self.salutation, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greet_formats_salutation() {
        assert_eq!(SalutationGreeter::default().greet("World"), "Hello, World!");
        assert_eq!(SalutationGreeter::new("Ahoy").greet("crew"), "Ahoy, crew!");
    }
}
