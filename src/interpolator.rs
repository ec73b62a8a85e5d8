use crate::{Element, InvalidInterpolator};

/// The interpolator types the platform can inflate from XML
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolatorKind {
    Linear,
    Accelerate,
    Decelerate,
    AccelerateDecelerate,
    Anticipate,
    Overshoot,
    AnticipateOvershoot,
    Bounce,
    Cycle,
    Path,
}

impl InterpolatorKind {
    pub const ALL: [InterpolatorKind; 10] = [
        Self::Linear,
        Self::Accelerate,
        Self::Decelerate,
        Self::AccelerateDecelerate,
        Self::Anticipate,
        Self::Overshoot,
        Self::AnticipateOvershoot,
        Self::Bounce,
        Self::Cycle,
        Self::Path,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Self::Linear => "linearInterpolator",
            Self::Accelerate => "accelerateInterpolator",
            Self::Decelerate => "decelerateInterpolator",
            Self::AccelerateDecelerate => "accelerateDecelerateInterpolator",
            Self::Anticipate => "anticipateInterpolator",
            Self::Overshoot => "overshootInterpolator",
            Self::AnticipateOvershoot => "anticipateOvershootInterpolator",
            Self::Bounce => "bounceInterpolator",
            Self::Cycle => "cycleInterpolator",
            Self::Path => "pathInterpolator",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

#[derive(Clone, Copy)]
enum Domain {
    Positive,
    NonNegative,
    Any,
}

impl Domain {
    fn contains(self, value: f32) -> bool {
        match self {
            Self::Positive => value > 0.0,
            Self::NonNegative => value >= 0.0,
            Self::Any => true,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Positive => "must be > 0",
            Self::NonNegative => "must be >= 0",
            Self::Any => "must be finite",
        }
    }
}

/// Check that a decoded interpolator is one the platform could build
pub fn validate(element: &Element) -> Result<InterpolatorKind, InvalidInterpolator> {
    let kind = InterpolatorKind::from_tag(&element.name)
        .ok_or_else(|| InvalidInterpolator::UnknownType(element.name.clone()))?;
    let tag = kind.tag();

    if let Some(child) = element.children.first() {
        return Err(InvalidInterpolator::UnexpectedChild {
            interpolator: tag,
            child: child.name.clone(),
        });
    }

    match kind {
        InterpolatorKind::Linear
        | InterpolatorKind::AccelerateDecelerate
        | InterpolatorKind::Bounce => {}
        InterpolatorKind::Accelerate | InterpolatorKind::Decelerate => {
            check_optional(element, tag, "factor", Domain::Positive)?;
        }
        InterpolatorKind::Anticipate | InterpolatorKind::Overshoot => {
            check_optional(element, tag, "tension", Domain::NonNegative)?;
        }
        InterpolatorKind::AnticipateOvershoot => {
            check_optional(element, tag, "tension", Domain::NonNegative)?;
            check_optional(element, tag, "extraTension", Domain::NonNegative)?;
        }
        InterpolatorKind::Cycle => {
            check_optional(element, tag, "cycles", Domain::Positive)?;
        }
        InterpolatorKind::Path => validate_path(element, tag)?,
    }

    Ok(kind)
}

fn validate_path(element: &Element, tag: &'static str) -> Result<(), InvalidInterpolator> {
    if let Some(path) = element.attribute("pathData") {
        if path.is_reference() {
            return Ok(());
        }
        let starts_with_move = path
            .value
            .trim_start()
            .starts_with(&['M', 'm'][..]);
        if !starts_with_move {
            return Err(InvalidInterpolator::InvalidPath {
                interpolator: tag,
                value: path.value.clone(),
            });
        }
        return Ok(());
    }

    check_required(element, tag, "controlX1")?;
    check_required(element, tag, "controlY1")?;

    // cubic curves need both second control coordinates
    let has_x2 = element.attribute("controlX2").is_some();
    let has_y2 = element.attribute("controlY2").is_some();
    if has_x2 || has_y2 {
        check_required(element, tag, "controlX2")?;
        check_required(element, tag, "controlY2")?;
    }
    Ok(())
}

fn check_required(
    element: &Element,
    tag: &'static str,
    parameter: &'static str,
) -> Result<(), InvalidInterpolator> {
    if element.attribute(parameter).is_none() {
        return Err(InvalidInterpolator::MissingParameter {
            interpolator: tag,
            parameter,
        });
    }
    check_optional(element, tag, parameter, Domain::Any)
}

fn check_optional(
    element: &Element,
    tag: &'static str,
    parameter: &'static str,
    domain: Domain,
) -> Result<(), InvalidInterpolator> {
    let Some(attr) = element.attribute(parameter) else {
        return Ok(());
    };
    // references resolve elsewhere, nothing to range-check here
    if attr.is_reference() {
        return Ok(());
    }

    let value: f32 = attr
        .value
        .trim()
        .parse()
        .map_err(|_| InvalidInterpolator::NotNumeric {
            interpolator: tag,
            parameter,
            value: attr.value.clone(),
        })?;

    if !value.is_finite() || !domain.contains(value) {
        return Err(InvalidInterpolator::OutOfRange {
            interpolator: tag,
            parameter,
            value: attr.value.clone(),
            expected: domain.describe(),
        });
    }
    Ok(())
}
