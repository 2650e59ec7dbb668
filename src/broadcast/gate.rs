/// One-shot readiness gate
///
/// Starts closed. It is primed once its precondition has been met and can
/// only open from there. `open` reports the transition exactly once and
/// nothing closes the gate again, so a released session stays released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gate {
    #[default]
    Closed,
    Primed,
    Open,
}

impl Gate {
    pub fn closed() -> Self {
        Gate::Closed
    }

    /// Marks the precondition as met. No effect once the gate is open.
    pub fn prime(&mut self) {
        if *self == Gate::Closed {
            *self = Gate::Primed;
        }
    }

    /// Opens a primed gate. Returns true only for the call that opened it.
    pub fn open(&mut self) -> bool {
        match self {
            Gate::Primed => {
                *self = Gate::Open;
                true
            }
            Gate::Closed | Gate::Open => false,
        }
    }

    pub fn is_open(&self) -> bool {
        *self == Gate::Open
    }
}
