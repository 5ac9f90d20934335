//! Destination resolver
//!
//! Maps a record's declared destination to the name used for the current
//! attempt. After a corrupted-replica failure on `<original>`, appends go to
//! `<original>.0`, then `<original>.1`, and so on; the counter (generation)
//! only ever moves forward for the lifetime of the resolver.
//!
//! Lookups and error recording are separate operations. Retrying the same
//! batch resolves to the same name until a new failure is actually observed,
//! so a retry never skips a generation.
//!
//! # Races
//!
//! Several pipelines may report a failure for the same original at once
//! (one batch, or overlapping retried batches). The next generation is
//! derived from the name each pipeline *attempted*, and the stored value is
//! only raised, never lowered. Pipelines that failed on the same attempted
//! name agree on the same next name, and a late report from an older
//! generation cannot rewind the counter.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::error::AppendError;

/// One redirected destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    /// Destination as declared by records
    pub original: String,
    /// Number of redirections minus one; the effective name's suffix
    pub generation: u32,
}

impl Redirection {
    /// Name appends currently go to
    pub fn effective(&self) -> String {
        redirected_name(&self.original, self.generation)
    }
}

#[derive(Debug, Default)]
struct RedirectionState {
    /// original -> current generation
    generations: HashMap<String, u32>,
    /// every redirected name ever handed out -> its origin
    issued: HashMap<String, Redirection>,
}

/// Tracks redirections per original destination
///
/// Lookups take a shared lock; recording an error takes the write lock.
#[derive(Debug)]
pub struct DestinationResolver {
    max_write_errors: u32,
    state: RwLock<RedirectionState>,
}

impl DestinationResolver {
    pub fn new(max_write_errors: u32) -> Self {
        Self {
            max_write_errors,
            state: RwLock::new(RedirectionState::default()),
        }
    }

    pub fn max_write_errors(&self) -> u32 {
        self.max_write_errors
    }

    /// Resolve a declared destination to its effective name
    ///
    /// # Errors
    ///
    /// Returns `RedirectLimitExceeded` once the destination's generation has
    /// reached `max_write_errors`.
    pub fn lookup(&self, original: &str) -> Result<String, AppendError> {
        let state = self.state.read();
        match state.generations.get(original) {
            None => Ok(original.to_string()),
            Some(&generation) => {
                self.check_limit(original, generation)?;
                Ok(redirected_name(original, generation))
            }
        }
    }

    /// Record a corrupted-replica failure on the name that was attempted
    ///
    /// `attempted` is either an original destination or a name previously
    /// returned by [`lookup`](Self::lookup). Returns the name the next attempt
    /// should use.
    ///
    /// # Errors
    ///
    /// Returns `RedirectLimitExceeded` when the new generation reaches
    /// `max_write_errors`. The generation is stored first, so later lookups
    /// fail the same way.
    pub fn record_error(&self, attempted: &str) -> Result<String, AppendError> {
        let mut state = self.state.write();

        let (original, next) = match state.issued.get(attempted) {
            Some(previous) => (
                previous.original.clone(),
                previous.generation.saturating_add(1),
            ),
            None => (attempted.to_string(), 0),
        };

        let generation = {
            let stored = state.generations.entry(original.clone()).or_insert(next);
            *stored = (*stored).max(next);
            *stored
        };

        let redirection = Redirection {
            original,
            generation,
        };
        let name = redirection.effective();

        tracing::warn!(
            destination = %redirection.original,
            attempted = %attempted,
            redirected_to = %name,
            generation,
            "destination redirected after corrupt replica"
        );

        self.check_limit(&redirection.original, generation)?;
        state.issued.insert(name.clone(), redirection);
        Ok(name)
    }

    /// Current redirections, sorted by original name
    pub fn redirections(&self) -> Vec<Redirection> {
        let state = self.state.read();
        let mut all: Vec<Redirection> = state
            .generations
            .iter()
            .map(|(original, &generation)| Redirection {
                original: original.clone(),
                generation,
            })
            .collect();
        all.sort_by(|a, b| a.original.cmp(&b.original));
        all
    }

    /// Current generation of a destination, if it was ever redirected
    pub fn generation(&self, original: &str) -> Option<u32> {
        self.state.read().generations.get(original).copied()
    }

    /// Number of redirected destinations
    pub fn len(&self) -> usize {
        self.state.read().generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().generations.is_empty()
    }

    fn check_limit(&self, original: &str, generation: u32) -> Result<(), AppendError> {
        if generation >= self.max_write_errors {
            return Err(AppendError::RedirectLimitExceeded {
                destination: original.to_string(),
                generation,
                max: self.max_write_errors,
            });
        }
        Ok(())
    }
}

/// `<original>.<generation>`
pub fn redirected_name(original: &str, generation: u32) -> String {
    format!("{original}.{generation}")
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod resolver_test;
