use anyhow::Result;
use tracing::{debug, warn};

type Strategy<'a, T> = Box<dyn FnOnce() -> Result<T> + 'a>;

/// An ordered list of fallible strategies. The first one to succeed wins.
pub struct Fallback<'a, T> {
    what: &'static str,
    strategies: Vec<(&'static str, Strategy<'a, T>)>,
}

/// The value produced by a [`Fallback`] and the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub source: &'static str,
    pub value: T,
    /// Number of strategies that failed before this one.
    pub skipped: usize,
}

impl<'a, T> Fallback<'a, T> {
    pub fn new(what: &'static str) -> Self {
        Self {
            what,
            strategies: Vec::new(),
        }
    }

    pub fn then(mut self, source: &'static str, strategy: impl FnOnce() -> Result<T> + 'a) -> Self {
        self.strategies.push((source, Box::new(strategy)));
        self
    }

    /// Try each strategy in order. Returns None only if every strategy failed.
    pub fn resolve(self) -> Option<Resolved<T>> {
        let what = self.what;
        for (skipped, (source, strategy)) in self.strategies.into_iter().enumerate() {
            match strategy() {
                Ok(value) => {
                    debug!(what, source, "resolved");
                    return Some(Resolved {
                        source,
                        value,
                        skipped,
                    });
                }
                Err(e) => warn!(
                    what,
                    source,
                    error = %format!("{e:#}"),
                    "strategy failed, trying next"
                ),
            }
        }
        None
    }
}
