use std::f64::consts::{FRAC_PI_2, PI, TAU};

use dxf2fcs_core::document::{Arc, Ellipse, LwPolyline, Spline};
use dxf2fcs_core::geometry::Point3;
use glam::DVec3;

use crate::options::{MAX_ELLIPSE_SEGMENTS_PER_QUADRANT, MAX_SPLINE_SAMPLES_PER_CONTROL_POINT};
use crate::stitcher::Segment;

const FULL_SWEEP_TOLERANCE: f64 = 1e-9;
const DEGENERATE_CHORD: f64 = 1e-12;

/// 逆时针扫掠角，归一化到 (0, 2π]；零或负扫掠视为整圆。
pub fn normalized_sweep(start: f64, end: f64) -> f64 {
    let sweep = (end - start).rem_euclid(TAU);
    if sweep <= FULL_SWEEP_TOLERANCE {
        TAU
    } else {
        sweep
    }
}

#[inline]
fn is_full_sweep(sweep: f64) -> bool {
    sweep >= TAU - FULL_SWEEP_TOLERANCE
}

/// 三点圆弧：起点、弧上中点、终点。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreePointArc {
    pub start: Point3,
    pub mid: Point3,
    pub end: Point3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArcSample {
    Partial(ThreePointArc),
    /// 扫掠满 360°，三点无法表达，按整圆处理。
    FullCircle,
}

pub fn sample_arc(arc: &Arc) -> ArcSample {
    let sweep = normalized_sweep(arc.start_angle, arc.end_angle);
    if is_full_sweep(sweep) {
        return ArcSample::FullCircle;
    }
    ArcSample::Partial(ThreePointArc {
        start: arc.point_at(arc.start_angle),
        mid: arc.point_at(arc.start_angle + sweep / 2.0),
        end: arc.point_at(arc.start_angle + sweep),
    })
}

/// 整圆的四个顶点，依次位于 0°、180°、90°、270°。
pub fn circle_quadrants(center: Point3, radius: f64) -> [Point3; 4] {
    let at = |angle: f64| {
        Point3::from_vec(center.as_vec3() + DVec3::new(radius * angle.cos(), radius * angle.sin(), 0.0))
    };
    [at(0.0), at(PI), at(FRAC_PI_2), at(3.0 * FRAC_PI_2)]
}

/// 椭圆（弧）按角度跨度均分为直线段，每 90° 约 `segments_per_quadrant` 段。
/// 返回值第二项表示是否为闭合整椭圆。
pub fn ellipse_segments(ellipse: &Ellipse, segments_per_quadrant: usize) -> (Vec<Segment>, bool) {
    let span = normalized_sweep(ellipse.start_parameter, ellipse.end_parameter);
    let is_closed = is_full_sweep(span);
    let per_quadrant = segments_per_quadrant.clamp(1, MAX_ELLIPSE_SEGMENTS_PER_QUADRANT) as f64;
    let count = ((span / FRAC_PI_2) * per_quadrant).ceil().max(1.0) as usize;

    let points: Vec<Point3> = (0..=count)
        .map(|index| {
            if is_closed && index == count {
                ellipse.point_at(ellipse.start_parameter)
            } else {
                ellipse.point_at(ellipse.start_parameter + span * index as f64 / count as f64)
            }
        })
        .collect();

    let segments = points
        .windows(2)
        .map(|pair| Segment::Line {
            start: pair[0],
            end: pair[1],
        })
        .collect();
    (segments, is_closed)
}

/// 轻量多段线展开为直线/圆弧段。圆弧段与展开后的 ARC 实体一致按逆时针记录，
/// 因此负 bulge 的段起终点互换，由缝合器恢复走向。
pub fn explode_lwpolyline(polyline: &LwPolyline) -> Vec<Segment> {
    let vertices = &polyline.vertices;
    if vertices.len() < 2 {
        return Vec::new();
    }

    let mut pairs: Vec<(usize, usize)> = (0..vertices.len() - 1).map(|i| (i, i + 1)).collect();
    if polyline.is_closed {
        pairs.push((vertices.len() - 1, 0));
    }

    let mut segments = Vec::with_capacity(pairs.len());
    for (from, to) in pairs {
        let start = vertices[from].position;
        let end = vertices[to].position;
        let chord = end.as_vec3() - start.as_vec3();
        if chord.length() <= DEGENERATE_CHORD {
            continue;
        }

        let bulge = vertices[from].bulge;
        if bulge.abs() <= f64::EPSILON {
            segments.push(Segment::Line { start, end });
            continue;
        }

        let mid = bulge_midpoint(start, end, bulge);
        if bulge > 0.0 {
            segments.push(Segment::Arc { start, mid, end });
        } else {
            segments.push(Segment::Arc {
                start: end,
                mid,
                end: start,
            });
        }
    }
    segments
}

/// bulge 圆弧的中点：弦中点沿右法向偏移矢高 `bulge · |弦| / 2`。
fn bulge_midpoint(start: Point3, end: Point3, bulge: f64) -> Point3 {
    let a = start.as_vec3();
    let b = end.as_vec3();
    let chord = b - a;
    let right_normal = DVec3::new(chord.y, -chord.x, 0.0).normalize_or_zero();
    let sagitta = bulge * chord.length() / 2.0;
    Point3::from_vec((a + b) / 2.0 + right_normal * sagitta)
}

/// 样条采样：有控制点时按 de Boor 求值，采样数为控制点数乘以倍数；
/// 只有拟合点时直接使用拟合点。
pub fn sample_spline(spline: &Spline, samples_per_control_point: usize) -> Vec<Point3> {
    let control_points = &spline.control_points;
    if control_points.is_empty() {
        return spline.fit_points.clone();
    }
    let n = control_points.len();
    if n < 2 {
        return control_points.clone();
    }

    let degree = (spline.degree.max(1) as usize).min(n - 1);
    let knots = if spline.knot_values.len() == n + degree + 1 {
        spline.knot_values.clone()
    } else {
        clamped_uniform_knots(n, degree)
    };
    let weights: Vec<f64> = if spline.is_rational && spline.weights.len() == n {
        spline.weights.clone()
    } else {
        vec![1.0; n]
    };

    let t0 = knots[degree];
    let t1 = knots[n];
    if t1 - t0 <= f64::EPSILON {
        return control_points.clone();
    }

    let per_point = samples_per_control_point.clamp(1, MAX_SPLINE_SAMPLES_PER_CONTROL_POINT);
    let count = n.saturating_mul(per_point).max(2);
    (0..count)
        .map(|index| {
            let t = if index + 1 == count {
                t1
            } else {
                t0 + (t1 - t0) * index as f64 / (count - 1) as f64
            };
            de_boor(control_points, &weights, &knots, degree, t)
        })
        .collect()
}

fn clamped_uniform_knots(n: usize, degree: usize) -> Vec<f64> {
    let interior = n - degree;
    let mut knots = Vec::with_capacity(n + degree + 1);
    knots.extend(std::iter::repeat_n(0.0, degree + 1));
    knots.extend((1..interior).map(|i| i as f64 / interior as f64));
    knots.extend(std::iter::repeat_n(1.0, degree + 1));
    knots
}

fn find_span(knots: &[f64], degree: usize, n: usize, t: f64) -> usize {
    if t >= knots[n] {
        let mut span = n - 1;
        while span > degree && knots[span] >= knots[span + 1] {
            span -= 1;
        }
        return span;
    }
    let mut span = degree;
    while span < n - 1 && t >= knots[span + 1] {
        span += 1;
    }
    span
}

fn de_boor(
    control_points: &[Point3],
    weights: &[f64],
    knots: &[f64],
    degree: usize,
    t: f64,
) -> Point3 {
    let n = control_points.len();
    let span = find_span(knots, degree, n, t);

    // 齐次坐标 (w·P, w)
    let mut d: Vec<(DVec3, f64)> = (0..=degree)
        .map(|j| {
            let i = j + span - degree;
            (control_points[i].as_vec3() * weights[i], weights[i])
        })
        .collect();

    for r in 1..=degree {
        for j in (r..=degree).rev() {
            let i = j + span - degree;
            let denominator = knots[i + degree + 1 - r] - knots[i];
            let alpha = if denominator.abs() <= f64::EPSILON {
                0.0
            } else {
                (t - knots[i]) / denominator
            };
            d[j] = (
                d[j - 1].0 * (1.0 - alpha) + d[j].0 * alpha,
                d[j - 1].1 * (1.0 - alpha) + d[j].1 * alpha,
            );
        }
    }

    let (point, weight) = d[degree];
    if weight.abs() <= f64::EPSILON {
        Point3::from_vec(point)
    } else {
        Point3::from_vec(point / weight)
    }
}
