//! Nozzle lift/set-down arbitration.
//!
//! The whole pump is either idle or filling on exactly one channel:
//!
//! ```text
//!   Idle --lift(c)--> Filling(c) --set_down(c)--> Idle
//! ```
//!
//! A lift while filling and a set-down of a nozzle that is not filling are
//! both ignored. Both checks read `fill_active` at the moment the event is
//! processed, so of two lifts in one batch only the first one starts a fill.

use pf_reactive::{Cell, CellSink, DisposeBag, Stream};
use tracing::debug;

use crate::channel::{Channel, NozzleState, PerChannel};

/// Payload of the end-of-fill stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillEnded;

pub struct LifeCycle {
    /// Fires the channel that just started filling.
    pub start: Stream<Channel>,
    /// Fires when the filling nozzle is set down.
    pub end: Stream<FillEnded>,
    /// `None` while idle, `Some(c)` while channel `c` fills.
    pub fill_active: Cell<Option<Channel>>,
}

impl LifeCycle {
    pub fn new(nozzles: &PerChannel<Stream<NozzleState>>, bag: &DisposeBag) -> Self {
        let rt = nozzles.one.runtime();
        let fill_active = CellSink::new(rt, None::<Channel>);

        let lifted: Vec<Stream<Channel>> = nozzles
            .iter()
            .map(|(ch, nozzle)| Self::when_lifted(nozzle, ch))
            .collect();
        let lift_nozzle = Stream::merge_all(rt, &lifted);

        let start = lift_nozzle
            .gate(&fill_active, |ch, active| match active {
                None => Some(*ch),
                Some(busy) => {
                    debug!(lifted = %ch, filling = %busy, "lift ignored, pump already filling");
                    None
                }
            })
            .filter_map(|ch| *ch);

        let set_down: Vec<Stream<FillEnded>> = nozzles
            .iter()
            .map(|(ch, nozzle)| Self::when_set_down(nozzle, ch, &fill_active))
            .collect();
        let end = Stream::merge_all(rt, &set_down);

        Stream::merge(&start.map(|ch| Some(*ch)), &end.map(|_| None))
            .emit_into(&fill_active)
            .disposed_by(bag);

        start
            .listen(|ch| debug!(channel = %ch, "fill started"))
            .disposed_by(bag);
        end.listen(|_| debug!("fill ended")).disposed_by(bag);

        Self {
            start,
            end,
            fill_active: fill_active.cell(),
        }
    }

    pub fn when_lifted(nozzle: &Stream<NozzleState>, channel: Channel) -> Stream<Channel> {
        nozzle
            .filter(|state| *state == NozzleState::Up)
            .map(move |_| channel)
    }

    /// Set-down of `channel`'s nozzle, only while that channel is filling.
    pub fn when_set_down(
        nozzle: &Stream<NozzleState>,
        channel: Channel,
        fill_active: &Cell<Option<Channel>>,
    ) -> Stream<FillEnded> {
        nozzle
            .gate(fill_active, move |state, active| {
                match (state, active) {
                    (NozzleState::Down, Some(filling)) if *filling == channel => Some(FillEnded),
                    (NozzleState::Down, _) => {
                        debug!(channel = %channel, "set-down ignored, nozzle not filling");
                        None
                    }
                    (NozzleState::Up, _) => None,
                }
            })
            .filter_map(|ended| *ended)
    }
}
