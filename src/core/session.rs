// This module provides arena-based generation session management using the bumpalo crate.
// GenerationSession is the hub shared by every part of one code generation pass: it owns
// the arena used for interned strings (function names, temporaries' prefixes, tags) and
// tracks statistics with interior mutability so the generator, the instruction selector
// and the scope stack can record events through a shared reference. SessionStats counts
// functions generated, nodes lowered with a per-kind breakdown, rewrites applied by
// complex rules, temporaries materialised, scopes opened and tables deduplicated; its
// Display impl is what `mlgen --stats` prints.

//! Arena-based generation session management.
//!
//! All interned data lives as long as the arena handed to
//! [`GenerationSession::new`], so callers never juggle owned copies of the
//! names they pass around during a pass.

use crate::ir::OpKind;
use bumpalo::Bump;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::fmt;

/// Arena-based generation session.
pub struct GenerationSession<'arena> {
    /// Arena allocator for interned data.
    arena: &'arena Bump,

    /// Session statistics for debugging and tuning target tables.
    stats: RefCell<SessionStats>,

    /// String interning for efficient storage.
    interned_strings: RefCell<HashMap<String, &'arena str>>,

    /// Function currently being generated.
    current_function: RefCell<Option<&'arena str>>,
}

impl<'arena> GenerationSession<'arena> {
    /// Create a new generation session with the given arena.
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(SessionStats::default()),
            interned_strings: RefCell::new(HashMap::new()),
            current_function: RefCell::new(None),
        }
    }

    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Intern a string in the arena.
    pub fn intern_str(&self, s: &str) -> &'arena str {
        let mut strings = self.interned_strings.borrow_mut();
        if let Some(&interned) = strings.get(s) {
            return interned;
        }

        let interned = self.arena.alloc_str(s);
        strings.insert(s.to_string(), interned);
        interned
    }

    pub fn set_current_function(&self, name: &str) {
        let name = self.intern_str(name);
        *self.current_function.borrow_mut() = Some(name);
    }

    pub fn current_function(&self) -> Option<&'arena str> {
        *self.current_function.borrow()
    }

    /// Record that a function was generated.
    pub fn record_function_generated(&self, name: &str, text_size: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.functions_generated += 1;
        stats.total_text_size += text_size;

        if stats.largest_function_size < text_size {
            stats.largest_function_size = text_size;
            stats.largest_function_name = name.to_string();
        }
        drop(stats);
        *self.current_function.borrow_mut() = None;
    }

    /// Record that a node was lowered by a rule.
    pub fn record_node_lowered(&self, kind: OpKind) {
        let mut stats = self.stats.borrow_mut();
        stats.nodes_lowered += 1;
        *stats.lowering_counts.entry(kind).or_insert(0) += 1;
    }

    pub fn record_rewrite(&self) {
        self.stats.borrow_mut().rewrites_applied += 1;
    }

    pub fn record_promotions(&self, count: usize) {
        self.stats.borrow_mut().nodes_promoted += count;
    }

    pub fn record_temporary(&self) {
        self.stats.borrow_mut().temporaries_materialized += 1;
    }

    pub fn record_scope_opened(&self) {
        self.stats.borrow_mut().scopes_opened += 1;
    }

    pub fn record_table_deduplicated(&self) {
        self.stats.borrow_mut().tables_deduplicated += 1;
    }

    /// Get generation statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Generation session statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Number of functions generated.
    pub functions_generated: usize,

    /// Total generated text (bytes).
    pub total_text_size: usize,

    /// Number of graph nodes lowered through the rule table.
    pub nodes_lowered: usize,

    /// Count of each operation kind lowered.
    pub lowering_counts: HashMap<OpKind, usize>,

    /// Largest function generated.
    pub largest_function_size: usize,
    pub largest_function_name: String,

    /// Replacement subgraphs produced by complex rules.
    pub rewrites_applied: usize,

    /// Shared or tagged nodes stored into named temporaries.
    pub temporaries_materialized: usize,

    /// Nested scopes opened.
    pub scopes_opened: usize,

    /// Table declarations answered with an existing name.
    pub tables_deduplicated: usize,

    /// Vector nodes retyped to native register formats.
    pub nodes_promoted: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Generation Session Statistics:")?;
        writeln!(f, "  Functions generated: {}", self.functions_generated)?;
        writeln!(f, "  Nodes lowered: {}", self.nodes_lowered)?;
        writeln!(f, "  Total text size: {} bytes", self.total_text_size)?;
        writeln!(f, "  Rewrites applied: {}", self.rewrites_applied)?;
        writeln!(f, "  Temporaries materialized: {}", self.temporaries_materialized)?;
        writeln!(f, "  Scopes opened: {}", self.scopes_opened)?;
        writeln!(f, "  Tables deduplicated: {}", self.tables_deduplicated)?;
        writeln!(f, "  Nodes promoted: {}", self.nodes_promoted)?;

        if !self.largest_function_name.is_empty() {
            writeln!(
                f,
                "  Largest function: {} ({} bytes)",
                self.largest_function_name, self.largest_function_size
            )?;
        }

        if !self.lowering_counts.is_empty() {
            writeln!(f, "  Lowering breakdown:")?;
            let mut sorted: Vec<_> = self.lowering_counts.iter().collect();
            sorted.sort_by(|(ka, ca), (kb, cb)| cb.cmp(ca).then(ka.name().cmp(kb.name())));

            for (kind, count) in sorted.into_iter().take(10) {
                writeln!(f, "    {}: {}", kind, count)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_session_creation() {
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);

        let stats = session.stats();
        assert_eq!(stats.functions_generated, 0);
        assert_eq!(stats.nodes_lowered, 0);
        assert!(session.current_function().is_none());
    }

    #[test]
    fn test_string_interning() {
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);

        let s1 = session.intern_str("exp_approx");
        let s2 = session.intern_str("exp_approx");
        let s3 = session.intern_str("log_approx");

        assert_eq!(s1.as_ptr(), s2.as_ptr());
        assert_ne!(s1.as_ptr(), s3.as_ptr());
    }

    #[test]
    fn test_session_statistics() {
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);

        session.set_current_function("my_exp");
        assert_eq!(session.current_function(), Some("my_exp"));
        session.record_node_lowered(OpKind::Addition);
        session.record_node_lowered(OpKind::Multiplication);
        session.record_node_lowered(OpKind::Addition);
        session.record_rewrite();
        session.record_temporary();
        session.record_scope_opened();
        session.record_scope_opened();
        session.record_table_deduplicated();
        session.record_promotions(4);
        session.record_promotions(0);
        session.record_function_generated("my_exp", 512);

        let stats = session.stats();
        assert_eq!(stats.functions_generated, 1);
        assert_eq!(stats.nodes_lowered, 3);
        assert_eq!(stats.lowering_counts[&OpKind::Addition], 2);
        assert_eq!(stats.lowering_counts[&OpKind::Multiplication], 1);
        assert_eq!(stats.rewrites_applied, 1);
        assert_eq!(stats.temporaries_materialized, 1);
        assert_eq!(stats.scopes_opened, 2);
        assert_eq!(stats.tables_deduplicated, 1);
        assert_eq!(stats.nodes_promoted, 4);
        assert!(session.current_function().is_none());
    }

    #[test]
    fn test_statistics_display() {
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);

        session.record_node_lowered(OpKind::Addition);
        session.record_node_lowered(OpKind::Select);
        session.record_function_generated("my_log", 256);

        let output = format!("{}", session.stats());
        assert!(output.contains("Functions generated: 1"));
        assert!(output.contains("Nodes lowered: 2"));
        assert!(output.contains("my_log (256 bytes)"));
        assert!(output.contains("    add: 1"));
    }
}
