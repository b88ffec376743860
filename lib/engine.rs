use anyhow::Result;

/// A session that evaluates source text and renders the result.
pub trait Engine {
    fn run(&mut self, input: &str) -> Result<String>;
}
