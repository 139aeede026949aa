//! Porter-Duff rule to native blend state translation

use crate::gl::{BlendFactor, BlendFactors};
use glaze_core::{Composite, CompositeRule};

use BlendFactor::{DstAlpha, One, OneMinusDstAlpha, OneMinusSrcAlpha, SrcAlpha, Zero};

/// Native blend configuration for one composite and source
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendSetup {
    /// `None` when the blend unit must be disabled
    pub blend: Option<BlendFactors>,
    /// The source must be premultiplied before it reaches the blend unit
    pub premultiply_source: bool,
    /// Per-channel transfer scale carrying the composite's extra alpha
    pub channel_scale: Option<[f32; 4]>,
}

impl BlendSetup {
    pub fn is_disabled(&self) -> bool {
        self.blend.is_none()
    }
}

/// Factors for premultiplied sources
fn premultiplied_factors(rule: CompositeRule) -> BlendFactors {
    let (src, dst) = match rule {
        CompositeRule::Clear => (Zero, Zero),
        CompositeRule::Src => (One, Zero),
        CompositeRule::SrcOver => (One, OneMinusSrcAlpha),
        CompositeRule::DstOver => (OneMinusDstAlpha, One),
        CompositeRule::SrcIn => (DstAlpha, Zero),
        CompositeRule::DstIn => (Zero, SrcAlpha),
        CompositeRule::SrcOut => (OneMinusDstAlpha, Zero),
        CompositeRule::DstOut => (Zero, OneMinusSrcAlpha),
        CompositeRule::Dst => (Zero, One),
        CompositeRule::SrcAtop => (DstAlpha, OneMinusSrcAlpha),
        CompositeRule::DstAtop => (OneMinusDstAlpha, SrcAlpha),
        CompositeRule::Xor => (OneMinusDstAlpha, OneMinusSrcAlpha),
    };
    BlendFactors::new(src, dst)
}

/// Factors for non-premultiplied sources; `None` where no factor pair exists
fn straight_factors(rule: CompositeRule) -> Option<BlendFactors> {
    let f = match rule {
        CompositeRule::Clear => BlendFactors::with_alpha(Zero, Zero, Zero),
        CompositeRule::Src => BlendFactors::with_alpha(SrcAlpha, Zero, One),
        CompositeRule::SrcOver => BlendFactors::with_alpha(SrcAlpha, OneMinusSrcAlpha, One),
        CompositeRule::DstIn => BlendFactors::with_alpha(Zero, SrcAlpha, Zero),
        CompositeRule::DstOut => BlendFactors::with_alpha(Zero, OneMinusSrcAlpha, Zero),
        CompositeRule::Dst => BlendFactors::with_alpha(Zero, One, Zero),
        _ => return None,
    };
    Some(f)
}

/// Factors for sources without an alpha channel (source alpha is one)
fn opaque_factors(rule: CompositeRule) -> BlendFactors {
    let (src, dst) = match rule {
        CompositeRule::Clear => (Zero, Zero),
        CompositeRule::Src => (One, Zero),
        CompositeRule::SrcOver => (One, Zero),
        CompositeRule::DstOver => (OneMinusDstAlpha, One),
        CompositeRule::SrcIn => (DstAlpha, Zero),
        CompositeRule::DstIn => (Zero, One),
        CompositeRule::SrcOut => (OneMinusDstAlpha, Zero),
        CompositeRule::DstOut => (Zero, Zero),
        CompositeRule::Dst => (Zero, One),
        CompositeRule::SrcAtop => (DstAlpha, Zero),
        CompositeRule::DstAtop => (OneMinusDstAlpha, One),
        CompositeRule::Xor => (OneMinusDstAlpha, Zero),
    };
    BlendFactors::new(src, dst)
}

/// Blend state for drawing a source through `composite`
///
/// Total over every rule and flag combination.
pub fn translate(composite: Composite, src_premultiplied: bool, src_has_alpha: bool) -> BlendSetup {
    let alpha = composite.alpha;
    let extra_alpha = alpha < 1.0;
    // an extra alpha gives the source an alpha channel
    let has_alpha = src_has_alpha || extra_alpha;

    if !has_alpha {
        if matches!(composite.rule, CompositeRule::Src | CompositeRule::SrcOver) {
            return BlendSetup {
                blend: None,
                premultiply_source: false,
                channel_scale: None,
            };
        }
        return BlendSetup {
            blend: Some(opaque_factors(composite.rule)),
            premultiply_source: false,
            channel_scale: None,
        };
    }

    let straight = if src_premultiplied {
        None
    } else {
        straight_factors(composite.rule)
    };
    match straight {
        Some(factors) => BlendSetup {
            blend: Some(factors),
            premultiply_source: false,
            channel_scale: extra_alpha.then_some([1.0, 1.0, 1.0, alpha]),
        },
        None => BlendSetup {
            blend: Some(premultiplied_factors(composite.rule)),
            premultiply_source: !src_premultiplied,
            channel_scale: extra_alpha.then_some([alpha; 4]),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_src_over_disables_blending() {
        let setup = translate(Composite::SRC_OVER, false, false);
        assert!(setup.is_disabled());
        assert!(!setup.premultiply_source);
        assert_eq!(setup.channel_scale, None);
    }

    #[test]
    fn test_extra_alpha_forces_blending() {
        let setup = translate(Composite::new(CompositeRule::SrcOver, 0.5), true, false);
        assert_eq!(
            setup.blend,
            Some(BlendFactors::new(One, OneMinusSrcAlpha))
        );
        assert_eq!(setup.channel_scale, Some([0.5; 4]));
    }

    #[test]
    fn test_straight_source_without_factors_is_premultiplied() {
        let setup = translate(Composite::new(CompositeRule::Xor, 1.0), false, true);
        assert!(setup.premultiply_source);
        assert_eq!(
            setup.blend,
            Some(BlendFactors::new(OneMinusDstAlpha, OneMinusSrcAlpha))
        );
    }

    #[test]
    fn test_straight_source_scales_alpha_only() {
        let setup = translate(Composite::new(CompositeRule::SrcOver, 0.25), false, true);
        assert!(!setup.premultiply_source);
        assert_eq!(setup.channel_scale, Some([1.0, 1.0, 1.0, 0.25]));
        assert_eq!(setup.blend.map(|b| b.src), Some(SrcAlpha));
    }

    #[test]
    fn test_every_combination_is_defined() {
        for rule in CompositeRule::ALL {
            for premultiplied in [true, false] {
                for has_alpha in [true, false] {
                    let setup = translate(Composite::new(rule, 1.0), premultiplied, has_alpha);
                    let fast = !has_alpha && matches!(rule, CompositeRule::Src | CompositeRule::SrcOver);
                    assert_eq!(setup.is_disabled(), fast, "{rule:?}");
                }
            }
        }
    }
}
