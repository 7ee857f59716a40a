//! Index-based stage sequence with splice-in-place.
//!
//! # Activation loop
//!
//! Starting or advancing an itinerary activates stages until one of them
//! has to wait for something:
//!
//! ```text
//!   loop:
//!     proceed(current, previous = stages[current - 1])
//!       CompleteAt(t), t > now  → return, owner wakes the agent at t
//!       CompleteAt(t), t <= now → arrive now, current += 1, loop
//!       AwaitVehicle            → return, owner registers the waiting agent
//!       Expand(res)             → insert res.stages after current,
//!                                 arrive the trip now, current += 1, loop
//! ```
//!
//! An expanded trip is closed before the first resolved stage proceeds.
//! Both happen at the same `now`, so the trip's arrival and the resolved
//! stage's departure coincide exactly as if the resolved stage had
//! proceeded first.
//!
//! Stages are addressed by index, so inserting resolved stages never
//! invalidates the cursor.  A failed resolution returns before anything is
//! inserted and leaves the trip undeparted; [`Itinerary::resume`] retries
//! it, e.g. after [`TripStage::set_origin`](crate::TripStage::set_origin).

use tp_core::{EdgeId, StopId, Tick};

use crate::router::PrivateVehicle;
use crate::{Stage, StageContext, StageError, StageResult, Transition, Traveller};

/// What the owner must do after the itinerary moved on.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Activation {
    /// Wake the agent at this tick and call [`Itinerary::advance`].
    CompleteAt(Tick),
    /// Register the agent as waiting for a vehicle on `edge`.
    AwaitVehicle { edge: EdgeId, stop: Option<StopId> },
    /// No stages left.
    Finished,
}

/// Outcome of [`Itinerary::start`] / [`Itinerary::advance`].
#[derive(Debug)]
pub struct Advance {
    pub activation:  Activation,
    /// Private vehicles requested by trips resolved along the way.
    pub vehicles:    Vec<PrivateVehicle>,
    /// Non-empty arrival diagnostics, in order.
    pub diagnostics: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Itinerary {
    stages:  Vec<Stage>,
    current: usize,
    started: bool,
    aborted: bool,
}

impl Itinerary {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages, current: 0, started: false, aborted: false }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Append a stage after all existing ones.
    pub fn push(&mut self, stage: impl Into<Stage>) {
        self.stages.push(stage.into());
    }

    pub fn current_stage(&self) -> Option<&Stage> {
        self.stages.get(self.current)
    }

    pub fn current_stage_mut(&mut self) -> Option<&mut Stage> {
        self.stages.get_mut(self.current)
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_finished(&self) -> bool {
        self.started && self.current >= self.stages.len()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Activate the first stage.
    pub fn start(&mut self, ctx: &StageContext<'_>, traveller: &mut Traveller<'_>, now: Tick) -> StageResult<Advance> {
        if self.started {
            return Err(StageError::Precondition("itinerary already started".to_owned()));
        }
        self.started = true;
        let mut adv = Advance { activation: Activation::Finished, vehicles: Vec::new(), diagnostics: Vec::new() };
        adv.activation = self.activate(ctx, traveller, now, &mut adv)?;
        Ok(adv)
    }

    /// Close the current stage at `now` and activate the following ones.
    pub fn advance(&mut self, ctx: &StageContext<'_>, traveller: &mut Traveller<'_>, now: Tick) -> StageResult<Advance> {
        let Some(stage) = self.stages.get_mut(self.current) else {
            return Err(StageError::Precondition("advance past the end of the itinerary".to_owned()));
        };
        let mut adv = Advance { activation: Activation::Finished, vehicles: Vec::new(), diagnostics: Vec::new() };
        let diagnostic = stage.set_arrived(ctx, now)?;
        if !diagnostic.is_empty() {
            adv.diagnostics.push(diagnostic);
        }
        self.current += 1;
        adv.activation = self.activate(ctx, traveller, now, &mut adv)?;
        Ok(adv)
    }

    /// Re-activate a current stage that never departed, typically a trip
    /// whose resolution failed.  Nothing is arrived.
    pub fn resume(&mut self, ctx: &StageContext<'_>, traveller: &mut Traveller<'_>, now: Tick) -> StageResult<Advance> {
        if !self.started || self.aborted {
            return Err(StageError::Precondition("resume of an itinerary that is not running".to_owned()));
        }
        match self.stages.get(self.current) {
            None => return Err(StageError::Precondition("resume past the end of the itinerary".to_owned())),
            Some(stage) if stage.departed().is_some() => {
                return Err(StageError::Precondition(format!(
                    "resume of a {} stage that already departed",
                    stage.stage_type()
                )));
            }
            Some(_) => {}
        }
        let mut adv = Advance { activation: Activation::Finished, vehicles: Vec::new(), diagnostics: Vec::new() };
        adv.activation = self.activate(ctx, traveller, now, &mut adv)?;
        Ok(adv)
    }

    fn activate(
        &mut self,
        ctx: &StageContext<'_>,
        traveller: &mut Traveller<'_>,
        now: Tick,
        adv: &mut Advance,
    ) -> StageResult<Activation> {
        loop {
            if self.current >= self.stages.len() {
                return Ok(Activation::Finished);
            }
            let (done, rest) = self.stages.split_at_mut(self.current);
            let transition = rest[0].proceed(ctx, traveller, now, done.last())?;
            match transition {
                Transition::CompleteAt(at) if at > now => return Ok(Activation::CompleteAt(at)),
                Transition::CompleteAt(_) => {}
                Transition::AwaitVehicle { edge, stop } => return Ok(Activation::AwaitVehicle { edge, stop }),
                Transition::Expand(resolution) => {
                    let at = self.current + 1;
                    self.stages.splice(at..at, resolution.stages);
                    adv.vehicles.extend(resolution.vehicles);
                }
            }
            let diagnostic = self.stages[self.current].set_arrived(ctx, now)?;
            if !diagnostic.is_empty() {
                adv.diagnostics.push(diagnostic);
            }
            self.current += 1;
        }
    }

    /// Cancel the rest of the itinerary.  The current stage releases any
    /// pending registration and no further stage is activated.
    pub fn abort(&mut self) {
        if let Some(stage) = self.stages.get_mut(self.current) {
            stage.abort();
        }
        self.started = true;
        self.aborted = true;
        self.current = self.stages.len();
    }

    /// End the itinerary at `now`, arriving the active stage if there is one.
    /// Returns the arrival diagnostic, if any.
    pub fn force_finish(&mut self, ctx: &StageContext<'_>, now: Tick) -> StageResult<Option<String>> {
        let mut diagnostic = None;
        if let Some(stage) = self.stages.get_mut(self.current) {
            if stage.core().is_active() {
                let msg = stage.set_arrived(ctx, now)?;
                diagnostic = Some(if msg.is_empty() {
                    format!("{} stage still active at simulation end", stage.stage_type())
                } else {
                    msg
                });
            }
        }
        self.started = true;
        self.current = self.stages.len();
        Ok(diagnostic)
    }
}
