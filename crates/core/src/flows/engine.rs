use thiserror::Error;

use crate::flows::states::{
    BookingStep, BookingUpdate, ReservationInProgress, ReservationPatch, StepTransition,
    TurnSignals,
};

pub trait FlowDefinition {
    fn initial_step(&self) -> BookingStep;
    fn advance(
        &self,
        reservation: &ReservationInProgress,
    ) -> Result<StepTransition, FlowTransitionError>;
}

/// The chat booking flow: dates, guests, room type, personal data, confirmation.
#[derive(Clone, Debug, Default)]
pub struct BookingFlow;

impl FlowDefinition for BookingFlow {
    fn initial_step(&self) -> BookingStep {
        BookingStep::Dates
    }

    fn advance(
        &self,
        reservation: &ReservationInProgress,
    ) -> Result<StepTransition, FlowTransitionError> {
        let from = reservation.step;
        let Some(to) = from.next() else {
            return Err(FlowTransitionError::Terminal { step: from });
        };

        let missing_fields = reservation.missing_for(from);
        if !missing_fields.is_empty() {
            return Err(FlowTransitionError::MissingRequiredFields { step: from, missing_fields });
        }

        Ok(StepTransition { from, to })
    }
}

impl BookingFlow {
    /// Folds one turn's signals into the reservation. Cancel wins over everything else;
    /// otherwise the patch is applied and the step advances as far as the data allows.
    pub fn update(
        &self,
        current: Option<ReservationInProgress>,
        signals: &TurnSignals,
    ) -> BookingUpdate {
        if signals.cancel_intent {
            return BookingUpdate {
                reservation: None,
                transitions: Vec::new(),
                started: false,
                cancelled: current.is_some(),
            };
        }

        let (mut reservation, started) = match current {
            Some(existing) => (existing, false),
            None if signals.booking_intent => (
                ReservationInProgress { step: self.initial_step(), ..ReservationInProgress::started() },
                true,
            ),
            None => return BookingUpdate::default(),
        };

        apply_patch(&mut reservation, &signals.patch);

        let mut transitions = Vec::new();
        while let Ok(transition) = self.advance(&reservation) {
            reservation.step = transition.to;
            transitions.push(transition);
        }

        BookingUpdate { reservation: Some(reservation), transitions, started, cancelled: false }
    }

    /// Transition list of an update, for logging.
    pub fn outcome(update: &BookingUpdate) -> Vec<(BookingStep, BookingStep)> {
        update.transitions.iter().map(|transition| (transition.from, transition.to)).collect()
    }
}

fn apply_patch(reservation: &mut ReservationInProgress, patch: &ReservationPatch) {
    let invalidates_price = (patch.check_in.is_some() && patch.check_in != reservation.check_in)
        || (patch.check_out.is_some() && patch.check_out != reservation.check_out)
        || (patch.room_type_id.is_some() && patch.room_type_id != reservation.room_type_id);

    if let Some(check_in) = patch.check_in {
        reservation.check_in = Some(check_in);
    }
    if let Some(check_out) = patch.check_out {
        reservation.check_out = Some(check_out);
    }
    if let Some(adults) = patch.adults {
        reservation.adults = Some(adults);
    }
    if let Some(children) = patch.children {
        reservation.children = Some(children);
    }
    if let Some(room_type_id) = patch.room_type_id {
        reservation.room_type_id = Some(room_type_id);
    }
    if let Some(personal_data) = &patch.personal_data {
        reservation.personal_data = Some(personal_data.clone());
    }

    if patch.computed_price.is_some() {
        reservation.computed_price = patch.computed_price;
    } else if invalidates_price {
        reservation.computed_price = None;
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("missing required fields before leaving {step:?}: {missing_fields:?}")]
    MissingRequiredFields { step: BookingStep, missing_fields: Vec<String> },
    #[error("{step:?} is the last booking step")]
    Terminal { step: BookingStep },
}
