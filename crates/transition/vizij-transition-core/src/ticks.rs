//! Tick sources: scale-like generators of "nice" values keyed as `tick-{val}`.
//!
//! A [`TickScale`] may or may not be able to produce ticks; a scale without the
//! capability yields an empty item sequence, which makes every tracked tick exit.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::JoinError;
use crate::group::{NodeGroup, Source};
use crate::transitions::Transitions;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub val: f64,
}

/// Key accessor used by tick groups.
pub fn tick_key(tick: &Tick) -> String {
    format!("tick-{}", tick.val)
}

pub trait TickScale {
    /// Approximately `count` ticks across the domain, or `None` if this scale
    /// cannot generate ticks.
    fn ticks(&self, _count: usize) -> Option<Vec<f64>> {
        None
    }
}

/// Continuous linear scale mapping `domain` onto `range`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearScale {
    pub domain: [f64; 2],
    pub range: [f64; 2],
}

impl LinearScale {
    pub fn new(domain: [f64; 2], range: [f64; 2]) -> Self {
        Self { domain, range }
    }

    /// Map a domain value into the range.
    pub fn scale(&self, v: f64) -> f64 {
        let [d0, d1] = self.domain;
        let [r0, r1] = self.range;
        if d1 == d0 {
            return (r0 + r1) * 0.5;
        }
        r0 + (v - d0) / (d1 - d0) * (r1 - r0)
    }
}

impl TickScale for LinearScale {
    fn ticks(&self, count: usize) -> Option<Vec<f64>> {
        Some(nice_ticks(self.domain[0], self.domain[1], count))
    }
}

const E10: f64 = 7.0710678118654755; // sqrt(50)
const E5: f64 = 3.1622776601683795; // sqrt(10)
const E2: f64 = 1.4142135623730951; // sqrt(2)

/// Integer bounds and increment for ticks in [start, stop] (start <= stop).
/// A negative increment means "divide by -inc", which keeps decimals exact.
fn tick_increment(start: f64, stop: f64, count: f64) -> (f64, f64, f64) {
    let step = (stop - start) / count.max(0.0);
    let power = step.log10().floor();
    let error = step / 10f64.powf(power);
    let factor = if error >= E10 {
        10.0
    } else if error >= E5 {
        5.0
    } else if error >= E2 {
        2.0
    } else {
        1.0
    };
    let (mut i1, mut i2, inc);
    if power < 0.0 {
        let inv = 10f64.powf(-power) / factor;
        i1 = (start * inv).round();
        i2 = (stop * inv).round();
        if i1 / inv < start {
            i1 += 1.0;
        }
        if i2 / inv > stop {
            i2 -= 1.0;
        }
        inc = -inv;
    } else {
        let step = 10f64.powf(power) * factor;
        i1 = (start / step).round();
        i2 = (stop / step).round();
        if i1 * step < start {
            i1 += 1.0;
        }
        if i2 * step > stop {
            i2 -= 1.0;
        }
        inc = step;
    }
    if i2 < i1 && (0.5..2.0).contains(&count) {
        return tick_increment(start, stop, count * 2.0);
    }
    (i1, i2, inc)
}

/// Human-friendly tick values (multiples of 1, 2 or 5 × 10ⁿ) covering the
/// domain, ordered like the domain.
pub fn nice_ticks(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if count == 0 || !start.is_finite() || !stop.is_finite() {
        return Vec::new();
    }
    if start == stop {
        return vec![start];
    }
    let reverse = stop < start;
    let (lo, hi) = if reverse { (stop, start) } else { (start, stop) };
    let (i1, i2, inc) = tick_increment(lo, hi, count as f64);
    if !(i2 >= i1) {
        return Vec::new();
    }
    let n = (i2 - i1 + 1.0) as usize;
    let mut out: Vec<f64> = (0..n)
        .map(|i| {
            let k = i1 + i as f64;
            if inc < 0.0 {
                k / -inc
            } else {
                k * inc
            }
        })
        .collect();
    if reverse {
        out.reverse();
    }
    out
}

/// Adapts a [`TickScale`] into an item source of [`Tick`]s.
#[derive(Clone, Debug)]
pub struct ScaleTicks<S> {
    pub scale: S,
    pub count: usize,
}

impl<S: TickScale> ScaleTicks<S> {
    pub fn new(scale: S, count: usize) -> Self {
        Self { scale, count }
    }

    /// Wrap into a fresh source handle. Each call yields a new identity, so
    /// handing it to a group always triggers a diff.
    pub fn into_source(self) -> Rc<dyn Source<Tick>>
    where
        S: 'static,
    {
        Rc::new(self)
    }
}

impl<S: TickScale> Source<Tick> for ScaleTicks<S> {
    fn items(&self) -> Option<Vec<Tick>> {
        self.scale
            .ticks(self.count)
            .map(|vals| vals.into_iter().map(|val| Tick { val }).collect())
    }
}

pub type TickGroup<T> = NodeGroup<Tick, T, fn(&Tick) -> String>;

/// A group over ticks keyed by [`tick_key`].
pub fn tick_group<T: Transitions<Tick>>(cfg: Config, transitions: T) -> TickGroup<T> {
    NodeGroup::new(cfg, tick_key as fn(&Tick) -> String, transitions)
}

impl<T: Transitions<Tick>> NodeGroup<Tick, T, fn(&Tick) -> String> {
    /// Join against `scale`'s ticks, requesting `Config::tick_count` of them.
    /// Every call is a new source, so the group always re-diffs.
    pub fn set_scale<S: TickScale + 'static>(&mut self, scale: S) -> Result<bool, JoinError> {
        let count = self.config().tick_count;
        self.set_source(ScaleTicks::new(scale, count).into_source())
    }
}
