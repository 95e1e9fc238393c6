//! Frame timing for the arcade video hardware.
//!
//! The raster beam is simulated with a cycle down-counter: two edges per
//! frame, one mid-screen and one at vblank. The machine polls the clock
//! between instructions and maps the edges to forced interrupt calls, so
//! there is no asynchronous signalling anywhere in the core.

/// 8080 clock and frame timing for Space Invaders.
pub const CPU_CLOCK_HZ: u32 = 2_000_000;
pub const FRAME_RATE_HZ: u32 = 60;
pub const CYCLES_PER_FRAME: i64 = (CPU_CLOCK_HZ / FRAME_RATE_HZ) as i64;
pub const HALF_FRAME_CYCLES: i64 = CYCLES_PER_FRAME / 2;

/// Interrupt vector for the mid-screen edge (RST 1).
pub const MID_FRAME_VECTOR: u16 = 0x08;
/// Interrupt vector for the vblank edge (RST 2).
pub const VBLANK_VECTOR: u16 = 0x10;

/// Edge reported by a single [`FrameClock::tick`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FrameEvent {
    None,
    HalfFrame,
    FullFrame,
}

/// Cycle down-counter detecting the two per-frame edges.
///
/// At most one edge fires per tick; the half-frame check runs first and,
/// when it fires, the full-frame check is skipped for that tick.
pub struct FrameClock {
    counter: i64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            counter: CYCLES_PER_FRAME,
        }
    }

    /// Account for one executed instruction and report any edge crossed.
    ///
    /// The full-frame edge resets the counter; the half-frame edge lets it
    /// keep running down.
    pub fn tick(&mut self, cycles: u32) -> FrameEvent {
        let before = self.counter;
        self.counter -= i64::from(cycles);

        if before > HALF_FRAME_CYCLES && self.counter <= HALF_FRAME_CYCLES {
            FrameEvent::HalfFrame
        } else if self.counter <= 0 {
            self.counter = CYCLES_PER_FRAME;
            FrameEvent::FullFrame
        } else {
            FrameEvent::None
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameClock, FrameEvent, CYCLES_PER_FRAME, HALF_FRAME_CYCLES};

    #[test]
    fn half_frame_edge_fires_once_on_crossing() {
        let mut clock = FrameClock::new();
        let mut events = Vec::new();
        let mut total: i64 = 0;
        while total <= HALF_FRAME_CYCLES + 20 {
            let event = clock.tick(10);
            total += 10;
            if event != FrameEvent::None {
                events.push((total, event));
            }
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1, FrameEvent::HalfFrame);
        // The edge fires exactly when the counter first drops to or below
        // the half-frame threshold.
        assert!(events[0].0 >= CYCLES_PER_FRAME - HALF_FRAME_CYCLES);
    }

    #[test]
    fn full_frame_edge_resets_the_counter() {
        let mut clock = FrameClock::new();
        let mut halves = 0;
        let mut fulls = 0;
        // Run two frames worth of cycles and expect two of each edge.
        let ticks = (CYCLES_PER_FRAME * 2 / 7) + 2;
        for _ in 0..ticks {
            match clock.tick(7) {
                FrameEvent::HalfFrame => halves += 1,
                FrameEvent::FullFrame => fulls += 1,
                FrameEvent::None => {}
            }
        }
        assert_eq!(halves, 2);
        assert_eq!(fulls, 2);
    }

    #[test]
    fn at_most_one_edge_per_tick_and_half_wins() {
        // A single giant tick crosses both thresholds; only the half-frame
        // edge is reported and the counter keeps running.
        let mut clock = FrameClock::new();
        assert_eq!(
            clock.tick(CYCLES_PER_FRAME as u32 + 5),
            FrameEvent::HalfFrame
        );
        // The counter is now below zero, so the next tick reports the
        // deferred full-frame edge and resets.
        assert_eq!(clock.tick(4), FrameEvent::FullFrame);
        assert_eq!(clock.tick(4), FrameEvent::None);
    }

    #[test]
    fn ordinary_ticks_report_nothing() {
        let mut clock = FrameClock::new();
        for _ in 0..100 {
            assert_eq!(clock.tick(4), FrameEvent::None);
        }
    }
}
