//! Shape property snapshot and best-effort restoration.
//!
//! A [`ShapeSnapshot`] is captured exactly once per shape, before any
//! mutation, and consumed exactly once when the replacement picture is
//! restored. Restoration is best-effort: each property application is
//! independently guarded and its outcome recorded in a [`RestoreReport`]
//! so partial property loss is inspectable rather than silent.

use tracing::{debug, warn};

use crate::error::Result;
use crate::session::{Hyperlink, Placement, Point, Size, WorkbookSession};

/// The restorable property set of a drawing shape.
#[derive(Debug, Clone)]
pub struct ShapeSnapshot {
    pub name: String,
    pub position: Point,
    pub size: Size,
    /// Degrees, 0 = unrotated.
    pub rotation: f64,
    pub aspect_locked: bool,
    /// `None` when the host rejected the read; not reapplied in that case.
    pub placement: Option<Placement>,
    pub visible: bool,
    pub alt_text: String,
    pub hyperlink: Option<Hyperlink>,
    /// Back-to-front stacking position at capture time, 1 = back-most.
    pub z_order_position: Option<u32>,
}

/// One restorable property, used to report restoration outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoredProperty {
    Name,
    Geometry,
    Rotation,
    AspectLock,
    Placement,
    Visibility,
    AltText,
    Hyperlink,
}

impl RestoredProperty {
    pub fn as_str(self) -> &'static str {
        match self {
            RestoredProperty::Name => "name",
            RestoredProperty::Geometry => "geometry",
            RestoredProperty::Rotation => "rotation",
            RestoredProperty::AspectLock => "aspect-lock",
            RestoredProperty::Placement => "placement",
            RestoredProperty::Visibility => "visibility",
            RestoredProperty::AltText => "alt-text",
            RestoredProperty::Hyperlink => "hyperlink",
        }
    }
}

/// Per-property outcomes of a restoration attempt.
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub applied: Vec<RestoredProperty>,
    pub failed: Vec<(RestoredProperty, String)>,
}

impl RestoreReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record<E: std::fmt::Display>(
        &mut self,
        property: RestoredProperty,
        outcome: std::result::Result<(), E>,
    ) {
        match outcome {
            Ok(()) => self.applied.push(property),
            Err(e) => self.failed.push((property, e.to_string())),
        }
    }
}

/// Capture the restorable property set of a shape. No side effects.
///
/// Name and geometry reads must succeed; every other property falls back to
/// a documented default when the host rejects the read (rotation 0, aspect
/// lock off, visible, empty alt-text, no hyperlink).
pub fn capture<S: WorkbookSession + ?Sized>(
    session: &S,
    sheet: &str,
    shape: &str,
) -> Result<ShapeSnapshot> {
    let position = session.shape_position(sheet, shape)?;
    let size = session.shape_size(sheet, shape)?;

    let rotation = session.shape_rotation(sheet, shape).unwrap_or_else(|e| {
        debug!(shape, %e, "rotation read rejected, assuming 0");
        0.0
    });
    let aspect_locked = session.shape_aspect_locked(sheet, shape).unwrap_or(false);
    let placement = session.shape_placement(sheet, shape).ok();
    let visible = session.shape_visible(sheet, shape).unwrap_or(true);
    let alt_text = session.shape_alt_text(sheet, shape).unwrap_or_default();
    let hyperlink = session
        .shape_hyperlink(sheet, shape)
        .ok()
        .flatten()
        .filter(|link| !link.is_empty());
    let z_order_position = session.shape_z_order(sheet, shape).ok();

    Ok(ShapeSnapshot {
        name: shape.to_string(),
        position,
        size,
        rotation,
        aspect_locked,
        placement,
        visible,
        alt_text,
        hyperlink,
        z_order_position,
    })
}

/// Reapply a snapshot to a freshly inserted picture.
///
/// Properties are applied in a fixed order: identity, geometry, rotation,
/// aspect-lock, placement, visibility, alt-text, hyperlink. A failure on one
/// property is recorded and does not abort the remaining ones.
///
/// Returns the shape's final name (the rename may be refused on collision,
/// in which case the host-assigned name stands) together with the report.
pub fn restore<S: WorkbookSession + ?Sized>(
    session: &mut S,
    sheet: &str,
    inserted_name: &str,
    snapshot: &ShapeSnapshot,
) -> (String, RestoreReport) {
    let mut report = RestoreReport::default();

    let current = match session.rename_shape(sheet, inserted_name, &snapshot.name) {
        Ok(final_name) => {
            report.applied.push(RestoredProperty::Name);
            final_name
        }
        Err(e) => {
            report.failed.push((RestoredProperty::Name, e.to_string()));
            inserted_name.to_string()
        }
    };

    let geometry = session
        .set_shape_position(sheet, &current, snapshot.position)
        .and_then(|()| session.set_shape_size(sheet, &current, snapshot.size));
    report.record(RestoredProperty::Geometry, geometry);

    if snapshot.rotation != 0.0 {
        let outcome = session.set_shape_rotation(sheet, &current, snapshot.rotation);
        report.record(RestoredProperty::Rotation, outcome);
    }

    let outcome = session.set_shape_aspect_locked(sheet, &current, snapshot.aspect_locked);
    report.record(RestoredProperty::AspectLock, outcome);

    if let Some(placement) = snapshot.placement {
        let outcome = session.set_shape_placement(sheet, &current, placement);
        report.record(RestoredProperty::Placement, outcome);
    }

    let outcome = session.set_shape_visible(sheet, &current, snapshot.visible);
    report.record(RestoredProperty::Visibility, outcome);

    let outcome = session.set_shape_alt_text(sheet, &current, &snapshot.alt_text);
    report.record(RestoredProperty::AltText, outcome);

    if let Some(link) = &snapshot.hyperlink {
        let outcome = session.add_shape_hyperlink(sheet, &current, link);
        report.record(RestoredProperty::Hyperlink, outcome);
    }

    for (property, reason) in &report.failed {
        warn!(
            sheet,
            shape = %current,
            property = property.as_str(),
            reason,
            "property not restored on replacement picture"
        );
    }

    (current, report)
}
