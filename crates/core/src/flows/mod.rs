pub mod engine;
pub mod states;

pub use engine::{BookingFlow, FlowDefinition, FlowTransitionError};
pub use states::{
    BookingStep, BookingUpdate, ReservationInProgress, ReservationPatch, StepTransition,
    TurnSignals,
};
