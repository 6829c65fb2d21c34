//! Two-node axial bar element.

use nalgebra::{SMatrix, Vector4};

use crate::errors::ElementError;
use crate::geometry::{Displacement, Line, Point};

/// 4×4 stiffness matrix ordered `[x_start, y_start, x_end, y_end]`.
pub type LocalStiffness = SMatrix<f64, 4, 4>;

/// Pin-jointed bar carrying axial load only.
///
/// Elements are derived from a connectivity entry every time the global matrix is
/// assembled. After a solve the owning [`TrussSystem`](crate::TrussSystem) records
/// the endpoint displacements and the resulting axial response on them.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    /// Segment between the two endpoint nodes.
    line: Line,
    /// Young's modulus in pascals.
    young_modulus: f64,
    /// Cross-sectional area in square metres.
    area: f64,
    /// Distance between the endpoints in metres.
    length: f64,
    /// Direction cosine with respect to the X axis.
    cos: f64,
    /// Direction cosine with respect to the Y axis.
    sin: f64,
    /// Stiffness matrix in global coordinates.
    stiffness: LocalStiffness,
    /// Displacement of the start node after a solve.
    start_displacement: Displacement,
    /// Displacement of the end node after a solve.
    end_displacement: Displacement,
    /// Axial force after a solve in newtons, tension positive.
    axial_force: f64,
}

impl Element {
    /// Build a bar between `start` and `end`.
    ///
    /// # Errors
    ///
    /// Returns [`ElementError::Degenerate`] when the endpoints coincide or are not
    /// finite, the property variants when `young_modulus` or `area` is not strictly
    /// positive and finite, and [`ElementError::NonFiniteStiffness`] when `E·A/L`
    /// overflows.
    ///
    /// # Examples
    /// ```
    /// use truss2d::{point, Element};
    ///
    /// let bar = Element::new(point(0.0, 0.0), point(3.0, 4.0), 200.0e9, 0.01)?;
    /// assert_eq!(bar.length(), 5.0);
    /// assert_eq!(bar.direction_cosines(), (0.6, 0.8));
    /// # Ok::<(), truss2d::ElementError>(())
    /// ```
    pub fn new(
        start: Point,
        end: Point,
        young_modulus: f64,
        area: f64,
    ) -> Result<Self, ElementError> {
        if !young_modulus.is_finite() || young_modulus <= 0.0 {
            return Err(ElementError::NonPositiveYoungModulus { young_modulus });
        }
        if !area.is_finite() || area <= 0.0 {
            return Err(ElementError::NonPositiveArea { area });
        }
        let line = Line::new(start, end);
        let length = line.length();
        if length <= 0.0 || !length.is_finite() {
            return Err(ElementError::Degenerate { length });
        }
        let direction = line.delta() / length;
        let (c, s) = (direction.x, direction.y);
        let ea_over_l = young_modulus * area / length;
        if !ea_over_l.is_finite() {
            return Err(ElementError::NonFiniteStiffness {
                axial_stiffness: ea_over_l,
            });
        }

        let stiffness = ea_over_l
            * LocalStiffness::from_row_slice(&[
                c * c, c * s, -c * c, -c * s, //
                c * s, s * s, -c * s, -s * s, //
                -c * c, -c * s, c * c, c * s, //
                -c * s, -s * s, c * s, s * s, //
            ]);

        Ok(Self {
            line,
            young_modulus,
            area,
            length,
            cos: c,
            sin: s,
            stiffness,
            start_displacement: Displacement::default(),
            end_displacement: Displacement::default(),
            axial_force: 0.0,
        })
    }

    /// Segment the element spans.
    #[must_use]
    pub fn line(&self) -> &Line {
        &self.line
    }

    /// Young's modulus in pascals.
    #[must_use]
    pub fn young_modulus(&self) -> f64 {
        self.young_modulus
    }

    /// Cross-sectional area in square metres.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Length in metres.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Direction cosines `(c, s)` of the bar axis.
    #[must_use]
    pub fn direction_cosines(&self) -> (f64, f64) {
        (self.cos, self.sin)
    }

    /// Axial stiffness `E·A/L` in newtons per metre.
    #[must_use]
    pub fn axial_stiffness(&self) -> f64 {
        self.young_modulus * self.area / self.length
    }

    /// Stiffness matrix in global coordinates.
    #[must_use]
    pub fn local_stiffness(&self) -> &LocalStiffness {
        &self.stiffness
    }

    /// Displacement of the start node recorded by the last solve.
    #[must_use]
    pub fn start_displacement(&self) -> Displacement {
        self.start_displacement
    }

    /// Displacement of the end node recorded by the last solve.
    #[must_use]
    pub fn end_displacement(&self) -> Displacement {
        self.end_displacement
    }

    /// Axial force recorded by the last solve, tension positive.
    #[must_use]
    pub fn axial_force(&self) -> f64 {
        self.axial_force
    }

    /// Axial stress recorded by the last solve, tension positive.
    #[must_use]
    pub fn stress(&self) -> f64 {
        self.axial_force / self.area
    }

    /// Store endpoint displacements and recover the axial force from them.
    pub(crate) fn record_displacements(&mut self, start: Displacement, end: Displacement) {
        self.start_displacement = start;
        self.end_displacement = end;
        let relative = end.to_vector() - start.to_vector();
        let elongation = self.cos * relative.x + self.sin * relative.y;
        self.axial_force = self.axial_stiffness() * elongation;
    }

    /// Forget any recorded results.
    pub(crate) fn clear_results(&mut self) {
        self.record_displacements(Displacement::default(), Displacement::default());
    }

    /// End forces in global coordinates produced by the recorded displacements.
    #[must_use]
    pub fn end_forces(&self) -> Vector4<f64> {
        let u = Vector4::new(
            self.start_displacement.x,
            self.start_displacement.y,
            self.end_displacement.x,
            self.end_displacement.y,
        );
        self.stiffness * u
    }
}
