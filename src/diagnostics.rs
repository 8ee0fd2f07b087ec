//! Sink for recoverable parsing anomalies.
//!
//! Nothing routed through here changes what gets parsed; it only changes
//! who gets to hear about it.

use std::fmt;
use std::sync::OnceLock;

static QUIET: OnceLock<bool> = OnceLock::new();

/// Silences [`Diagnostics::Stderr`] for the whole process.
///
/// Only the first call takes effect. Returns `false` if the toggle had
/// already been set.
pub fn set_quiet(quiet: bool) -> bool {
    QUIET.set(quiet).is_ok()
}

pub fn is_quiet() -> bool {
    QUIET.get().copied().unwrap_or(false)
}

#[derive(Default)]
pub enum Diagnostics {
    /// Print each message to stderr unless [`set_quiet`] was called.
    #[default]
    Stderr,
    /// Keep every message, in order.
    Collect(Vec<String>),
    /// Drop everything.
    Silent,
    Callback(Box<dyn FnMut(&str)>),
}

impl Diagnostics {
    pub fn collect() -> Self {
        Diagnostics::Collect(Vec::new())
    }

    pub fn callback<F: FnMut(&str) + 'static>(f: F) -> Self {
        Diagnostics::Callback(Box::new(f))
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        match self {
            Diagnostics::Stderr => {
                if !is_quiet() {
                    eprintln!("{}", msg.into());
                }
            }
            Diagnostics::Collect(messages) => messages.push(msg.into()),
            Diagnostics::Silent => {}
            Diagnostics::Callback(f) => f(&msg.into()),
        }
    }

    /// Messages gathered so far. Empty for every sink but `Collect`.
    pub fn messages(&self) -> &[String] {
        match self {
            Diagnostics::Collect(messages) => messages,
            _ => &[],
        }
    }

    pub fn take(&mut self) -> Vec<String> {
        match self {
            Diagnostics::Collect(messages) => std::mem::take(messages),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostics::Stderr => f.write_str("Stderr"),
            Diagnostics::Collect(messages) => f.debug_tuple("Collect").field(messages).finish(),
            Diagnostics::Silent => f.write_str("Silent"),
            Diagnostics::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_collect_keeps_order() {
        let mut d = Diagnostics::collect();
        d.warn("first");
        d.warn(format!("second {}", 2));
        assert_eq!(d.messages(), ["first", "second 2"]);
        assert_eq!(d.take(), vec!["first".to_string(), "second 2".to_string()]);
        assert!(d.messages().is_empty());
    }

    #[test]
    fn test_silent_drops_everything() {
        let mut d = Diagnostics::Silent;
        d.warn("nobody hears this");
        assert!(d.messages().is_empty());
    }

    #[test]
    fn test_callback_receives_messages() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut d = Diagnostics::callback(move |m| sink.borrow_mut().push(m.to_string()));
        d.warn("hello");
        assert_eq!(*seen.borrow(), vec!["hello".to_string()]);
    }
}
