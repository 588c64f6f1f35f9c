//! Scope guard pairing an enter action with an exit action.
//!
//! The enter action runs while the guard is being constructed. The exit action
//! runs exactly once when the guard is dropped, which covers normal scope end,
//! early `return`/`?` and unwinding. The exit action is only registered once
//! the enter action has completed, so a failed enter never triggers cleanup.
//!
//! ```
//! use httpchain::scope::Scoped;
//!
//! let mut log = Vec::new();
//! {
//!     let _guard = Scoped::on_exit(|| log.push("closed"));
//! }
//! assert_eq!(log, ["closed"]);
//! ```

type ExitFn<'a> = Box<dyn FnOnce() + 'a>;

/// Runs an optional exit action when dropped.
#[must_use = "the exit action runs as soon as the guard is dropped"]
pub struct Scoped<'a> {
    exit: Option<ExitFn<'a>>,
}

impl<'a> Scoped<'a> {
    /// Run `on_enter` (if any) and arm `on_exit` (if any).
    ///
    /// If `on_enter` panics, the guard is never built and `on_exit` is
    /// dropped without being called.
    pub fn new<E, X>(on_enter: Option<E>, on_exit: Option<X>) -> Self
    where
        E: FnOnce(),
        X: FnOnce() + 'a,
    {
        if let Some(enter) = on_enter {
            enter();
        }
        Self {
            exit: on_exit.map(|exit| Box::new(exit) as ExitFn<'a>),
        }
    }

    /// Like [`Scoped::new`] with a fallible enter action.
    ///
    /// On `Err` the exit action is discarded and the error returned.
    pub fn try_new<E, X, Err>(on_enter: Option<E>, on_exit: Option<X>) -> Result<Self, Err>
    where
        E: FnOnce() -> Result<(), Err>,
        X: FnOnce() + 'a,
    {
        if let Some(enter) = on_enter {
            enter()?;
        }
        Ok(Self {
            exit: on_exit.map(|exit| Box::new(exit) as ExitFn<'a>),
        })
    }

    pub fn enter_exit<E, X>(on_enter: E, on_exit: X) -> Self
    where
        E: FnOnce(),
        X: FnOnce() + 'a,
    {
        Self::new(Some(on_enter), Some(on_exit))
    }

    pub fn on_exit<X>(on_exit: X) -> Self
    where
        X: FnOnce() + 'a,
    {
        Self {
            exit: Some(Box::new(on_exit)),
        }
    }

    /// Disarm the guard. The exit action is dropped without running.
    pub fn dismiss(mut self) {
        self.exit = None;
    }
}

impl Drop for Scoped<'_> {
    fn drop(&mut self) {
        if let Some(exit) = self.exit.take() {
            exit();
        }
    }
}

impl std::fmt::Debug for Scoped<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scoped")
            .field("armed", &self.exit.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn exit_only_runs_once_at_scope_end() {
        let exits = Cell::new(0);
        {
            let _guard = Scoped::on_exit(|| exits.set(exits.get() + 1));
            assert_eq!(exits.get(), 0);
        }
        assert_eq!(exits.get(), 1);
    }

    #[test]
    fn enter_runs_during_construction_before_exit() {
        let events = RefCell::new(Vec::new());
        {
            let _guard = Scoped::enter_exit(
                || events.borrow_mut().push("enter"),
                || events.borrow_mut().push("exit"),
            );
            events.borrow_mut().push("body");
        }
        assert_eq!(*events.borrow(), ["enter", "body", "exit"]);
    }

    #[test]
    fn exit_runs_on_early_return() {
        fn early(exits: &Cell<u32>, bail: bool) -> Option<u32> {
            let _guard = Scoped::on_exit(|| exits.set(exits.get() + 1));
            if bail {
                return None;
            }
            Some(1)
        }

        let exits = Cell::new(0);
        assert_eq!(early(&exits, true), None);
        assert_eq!(exits.get(), 1);
        assert_eq!(early(&exits, false), Some(1));
        assert_eq!(exits.get(), 2);
    }

    #[test]
    fn exit_runs_when_unwinding() {
        let exits = Cell::new(0);
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _guard = Scoped::on_exit(|| exits.set(exits.get() + 1));
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(exits.get(), 1);
    }

    #[test]
    fn absent_actions_do_nothing() {
        let guard = Scoped::new(None::<fn()>, None::<fn()>);
        drop(guard);
    }

    #[test]
    fn panicking_enter_never_runs_exit() {
        let exits = Cell::new(0);
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _guard = Scoped::enter_exit(|| panic!("acquire failed"), || exits.set(1));
        }));
        assert!(result.is_err());
        assert_eq!(exits.get(), 0);
    }

    #[test]
    fn failing_enter_never_runs_exit() {
        let exits = Cell::new(0);
        let guard = Scoped::try_new(Some(|| Err("no resource")), Some(|| exits.set(1)));
        assert_eq!(guard.err(), Some("no resource"));
        assert_eq!(exits.get(), 0);
    }

    #[test]
    fn successful_try_new_arms_exit() {
        let exits = Cell::new(0);
        {
            let guard: Result<Scoped, ()> = Scoped::try_new(Some(|| Ok(())), Some(|| exits.set(1)));
            assert!(guard.is_ok());
        }
        assert_eq!(exits.get(), 1);
    }

    #[test]
    fn dismissed_guard_never_runs_exit() {
        let exits = Cell::new(0);
        let guard = Scoped::on_exit(|| exits.set(1));
        guard.dismiss();
        assert_eq!(exits.get(), 0);
    }
}
