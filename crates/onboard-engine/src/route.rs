//! The portal's closed set of employee-facing routes.

use std::fmt;
use std::str::FromStr;

use onboard_core::error::OnboardError;
use onboard_core::models::step::{Step, StepKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Shift,
    Footwear,
    I9,
    PhotoBadge,
    FirstDay,
    Progress,
}

/// Whether the employee may open a step route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Open,
    Locked,
    Done,
}

impl Route {
    pub const ALL: [Route; 7] = [
        Route::Home,
        Route::Shift,
        Route::Footwear,
        Route::I9,
        Route::PhotoBadge,
        Route::FirstDay,
        Route::Progress,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Route::Home => "home",
            Route::Shift => "shift",
            Route::Footwear => "footwear",
            Route::I9 => "i9",
            Route::PhotoBadge => "photo_badge",
            Route::FirstDay => "firstday",
            Route::Progress => "progress",
        }
    }

    /// The step a route completes, for step routes.
    pub fn step(self) -> Option<StepKind> {
        match self {
            Route::Shift => Some(StepKind::ShiftSelection),
            Route::Footwear => Some(StepKind::Footwear),
            Route::I9 => Some(StepKind::I9),
            Route::PhotoBadge => Some(StepKind::PhotoBadge),
            Route::FirstDay => Some(StepKind::FirstDay),
            Route::Home | Route::Progress => None,
        }
    }

    pub fn for_step(kind: StepKind) -> Self {
        match kind {
            StepKind::ShiftSelection => Route::Shift,
            StepKind::Footwear => Route::Footwear,
            StepKind::I9 => Route::I9,
            StepKind::PhotoBadge => Route::PhotoBadge,
            StepKind::FirstDay => Route::FirstDay,
        }
    }

    /// Gating status of a step route against normalized `steps`. Non-step
    /// routes are always open.
    pub fn access(self, steps: &[Step]) -> RouteAccess {
        let Some(step) = self.step().and_then(|kind| steps.get(kind.index())) else {
            return RouteAccess::Open;
        };
        if step.done {
            RouteAccess::Done
        } else if step.locked {
            RouteAccess::Locked
        } else {
            RouteAccess::Open
        }
    }

    /// Where a request for this route should land: locked step routes
    /// fall back to the next actionable step (or progress once everything
    /// is done); everything else is served as requested.
    pub fn dispatch(self, steps: &[Step]) -> Route {
        match self.access(steps) {
            RouteAccess::Locked => onboard_core::models::step::next_step(steps)
                .and_then(Step::kind)
                .map(Route::for_step)
                .unwrap_or(Route::Progress),
            RouteAccess::Open | RouteAccess::Done => self,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Route {
    type Err = OnboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_start_matches('/').to_ascii_lowercase();
        Route::ALL
            .into_iter()
            .find(|r| r.as_str() == name)
            .ok_or_else(|| OnboardError::not_found("route", s))
    }
}
