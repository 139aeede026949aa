//! Stroke descriptors

use smallvec::SmallVec;

/// Line cap style
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

/// Line join style
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// Alternating on/off segment lengths starting with "on", in device units
#[derive(Clone, Debug, PartialEq)]
pub struct Dash {
    pub array: SmallVec<[f32; 8]>,
    pub phase: f32,
}

impl Dash {
    pub fn new(array: &[f32], phase: f32) -> Self {
        Self {
            array: SmallVec::from_slice(array),
            phase,
        }
    }

    /// Total length of one on/off cycle; odd arrays cycle twice
    pub fn period(&self) -> f32 {
        let sum: f32 = self.array.iter().sum();
        if self.array.len() % 2 == 1 {
            sum * 2.0
        } else {
            sum
        }
    }
}

/// Stroke parameters
#[derive(Clone, Debug, PartialEq)]
pub struct Stroke {
    pub width: f32,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f32,
    pub dash: Option<Dash>,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            width: 1.0,
            cap: LineCap::default(),
            join: LineJoin::default(),
            miter_limit: 10.0,
            dash: None,
        }
    }
}

impl Stroke {
    pub fn new(width: f32) -> Self {
        Self {
            width,
            ..Default::default()
        }
    }

    pub fn with_cap(mut self, cap: LineCap) -> Self {
        self.cap = cap;
        self
    }

    pub fn with_join(mut self, join: LineJoin) -> Self {
        self.join = join;
        self
    }

    pub fn with_dash(mut self, array: &[f32], phase: f32) -> Self {
        self.dash = if array.is_empty() {
            None
        } else {
            Some(Dash::new(array, phase))
        };
        self
    }

    /// Hairline strokes are at most one device unit wide
    pub fn is_thin(&self) -> bool {
        self.width <= 1.0
    }
}
