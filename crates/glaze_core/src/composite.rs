//! Porter-Duff compositing rules

/// The twelve Porter-Duff rules
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompositeRule {
    Clear,
    Src,
    #[default]
    SrcOver,
    DstOver,
    SrcIn,
    DstIn,
    SrcOut,
    DstOut,
    Dst,
    SrcAtop,
    DstAtop,
    Xor,
}

impl CompositeRule {
    pub const ALL: [CompositeRule; 12] = [
        CompositeRule::Clear,
        CompositeRule::Src,
        CompositeRule::SrcOver,
        CompositeRule::DstOver,
        CompositeRule::SrcIn,
        CompositeRule::DstIn,
        CompositeRule::SrcOut,
        CompositeRule::DstOut,
        CompositeRule::Dst,
        CompositeRule::SrcAtop,
        CompositeRule::DstAtop,
        CompositeRule::Xor,
    ];
}

/// A compositing rule with an extra constant alpha applied to the source
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Composite {
    pub rule: CompositeRule,
    /// 0.0 to 1.0
    pub alpha: f32,
}

impl Default for Composite {
    fn default() -> Self {
        Self::SRC_OVER
    }
}

impl Composite {
    pub const SRC_OVER: Composite = Composite {
        rule: CompositeRule::SrcOver,
        alpha: 1.0,
    };
    pub const SRC: Composite = Composite {
        rule: CompositeRule::Src,
        alpha: 1.0,
    };

    pub fn new(rule: CompositeRule, alpha: f32) -> Self {
        Self {
            rule,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    pub fn is_opaque_alpha(&self) -> bool {
        self.alpha >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_is_clamped() {
        assert_eq!(Composite::new(CompositeRule::Src, 1.5).alpha, 1.0);
        assert_eq!(Composite::new(CompositeRule::Src, -0.5).alpha, 0.0);
    }
}
