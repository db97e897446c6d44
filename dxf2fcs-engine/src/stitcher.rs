//! 把展开后的直线/圆弧段串成连续链，并切分为直线段组与三点圆弧。

use dxf2fcs_core::geometry::Point3;
use tracing::debug;

/// 判定两点重合的容差（块局部坐标单位）。
pub const COINCIDENCE_TOLERANCE: f64 = 1e-8;

#[inline]
pub fn coincident(a: Point3, b: Point3) -> bool {
    (a.as_vec3() - b.as_vec3()).length() <= COINCIDENCE_TOLERANCE
}

/// 展开得到的单个段。圆弧段记录起点、弧上中点与终点。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    Line { start: Point3, end: Point3 },
    Arc { start: Point3, mid: Point3, end: Point3 },
}

impl Segment {
    #[inline]
    pub fn start(&self) -> Point3 {
        match self {
            Segment::Line { start, .. } | Segment::Arc { start, .. } => *start,
        }
    }

    #[inline]
    pub fn end(&self) -> Point3 {
        match self {
            Segment::Line { end, .. } | Segment::Arc { end, .. } => *end,
        }
    }

    #[inline]
    pub fn mid(&self) -> Option<Point3> {
        match self {
            Segment::Line { .. } => None,
            Segment::Arc { mid, .. } => Some(*mid),
        }
    }
}

/// 链上的点；`mid` 存在时表示从前一点到此点是一段圆弧。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentPoint {
    pub position: Point3,
    pub mid: Option<Point3>,
}

impl SegmentPoint {
    #[inline]
    fn straight(position: Point3) -> Self {
        Self {
            position,
            mid: None,
        }
    }
}

/// 切分结果：至少两点的直线组，或一段三点圆弧。
#[derive(Debug, Clone, PartialEq)]
pub enum ChainPiece {
    Straight(Vec<Point3>),
    Arc { start: Point3, mid: Point3, end: Point3 },
}

/// 按顺序连接各段。第二段与首段正向不相接时整体反转一次已建链；
/// 仍不相接的段以直线桥接到其近端点。
pub fn stitch(segments: &[Segment], is_closed: bool) -> Vec<SegmentPoint> {
    let Some(first) = segments.first() else {
        return Vec::new();
    };

    let mut chain = vec![
        SegmentPoint::straight(first.start()),
        SegmentPoint {
            position: first.end(),
            mid: first.mid(),
        },
    ];

    for (index, segment) in segments.iter().enumerate().skip(1) {
        let last = chain[chain.len() - 1].position;
        if coincident(segment.start(), last) {
            append_forward(&mut chain, segment);
            continue;
        }
        if coincident(segment.end(), last) {
            append_reversed(&mut chain, segment);
            continue;
        }

        if index == 1 {
            let head = chain[0].position;
            if coincident(segment.start(), head) || coincident(segment.end(), head) {
                reverse_chain(&mut chain);
                if coincident(segment.start(), head) {
                    append_forward(&mut chain, segment);
                } else {
                    append_reversed(&mut chain, segment);
                }
                continue;
            }
        }

        // 不相接：从较近的端点桥接
        let last_vec = last.as_vec3();
        let start_gap = (segment.start().as_vec3() - last_vec).length();
        let end_gap = (segment.end().as_vec3() - last_vec).length();
        debug!(index, start_gap, end_gap, "段不连续，使用直线桥接");
        if end_gap < start_gap {
            chain.push(SegmentPoint::straight(segment.end()));
            append_reversed(&mut chain, segment);
        } else {
            chain.push(SegmentPoint::straight(segment.start()));
            append_forward(&mut chain, segment);
        }
    }

    if is_closed {
        let head = chain[0].position;
        let tail = chain[chain.len() - 1].position;
        if !coincident(head, tail) {
            chain.push(SegmentPoint::straight(head));
        }
    }

    chain
}

fn append_forward(chain: &mut Vec<SegmentPoint>, segment: &Segment) {
    chain.push(SegmentPoint {
        position: segment.end(),
        mid: segment.mid(),
    });
}

fn append_reversed(chain: &mut Vec<SegmentPoint>, segment: &Segment) {
    chain.push(SegmentPoint {
        position: segment.start(),
        mid: segment.mid(),
    });
}

/// 反转点序，中点随之挂到反转后紧随其后的点上。
fn reverse_chain(chain: &mut Vec<SegmentPoint>) {
    let mids: Vec<Option<Point3>> = chain.iter().map(|point| point.mid).collect();
    chain.reverse();
    let len = chain.len();
    for (index, point) in chain.iter_mut().enumerate() {
        point.mid = if index == 0 { None } else { mids[len - index] };
    }
}

/// 遍历链：无中点的点累积为直线组，遇到圆弧终点时先输出直线组再输出圆弧。
pub fn split_runs(chain: &[SegmentPoint]) -> Vec<ChainPiece> {
    let mut pieces = Vec::new();
    let Some(first) = chain.first() else {
        return pieces;
    };

    let mut run = vec![first.position];
    for point in &chain[1..] {
        match point.mid {
            Some(mid) => {
                let start = run[run.len() - 1];
                if run.len() >= 2 {
                    pieces.push(ChainPiece::Straight(std::mem::take(&mut run)));
                }
                pieces.push(ChainPiece::Arc {
                    start,
                    mid,
                    end: point.position,
                });
                run = vec![point.position];
            }
            None => run.push(point.position),
        }
    }
    if run.len() >= 2 {
        pieces.push(ChainPiece::Straight(run));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point3 {
        Point3::new(x, y, 0.0)
    }

    fn line(a: Point3, b: Point3) -> Segment {
        Segment::Line { start: a, end: b }
    }

    fn positions(chain: &[SegmentPoint]) -> Vec<Point3> {
        chain.iter().map(|point| point.position).collect()
    }

    #[test]
    fn forward_chain_keeps_segment_order() {
        let chain = stitch(
            &[line(p(0.0, 0.0), p(1.0, 0.0)), line(p(1.0, 0.0), p(1.0, 1.0))],
            false,
        );
        assert_eq!(positions(&chain), vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)]);
    }

    #[test]
    fn backwards_first_segment_is_corrected() {
        let a = line(p(0.0, 0.0), p(1.0, 0.0));
        let a_reversed = line(p(1.0, 0.0), p(0.0, 0.0));
        let b = line(p(1.0, 0.0), p(1.0, 1.0));

        let expected = positions(&stitch(&[a, b], false));
        assert_eq!(positions(&stitch(&[a_reversed, b], false)), expected);
    }

    #[test]
    fn reversed_second_segment_is_appended_by_its_start() {
        let chain = stitch(
            &[line(p(0.0, 0.0), p(1.0, 0.0)), line(p(1.0, 1.0), p(1.0, 0.0))],
            false,
        );
        assert_eq!(positions(&chain), vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)]);
    }

    #[test]
    fn reversal_moves_arc_midpoint_to_following_point() {
        let arc = Segment::Arc {
            start: p(2.0, 0.0),
            mid: p(1.0, 1.0),
            end: p(0.0, 0.0),
        };
        let next = line(p(2.0, 0.0), p(3.0, 0.0));
        let chain = stitch(&[arc, next], false);
        assert_eq!(positions(&chain), vec![p(0.0, 0.0), p(2.0, 0.0), p(3.0, 0.0)]);
        assert_eq!(chain[0].mid, None);
        assert_eq!(chain[1].mid, Some(p(1.0, 1.0)));
        assert_eq!(chain[2].mid, None);
    }

    #[test]
    fn closed_chain_is_reclosed_once() {
        let chain = stitch(
            &[line(p(0.0, 0.0), p(1.0, 0.0)), line(p(1.0, 0.0), p(1.0, 1.0))],
            true,
        );
        assert_eq!(chain.len(), 4);
        assert_eq!(chain[3].position, p(0.0, 0.0));

        let already_closed = stitch(
            &[
                line(p(0.0, 0.0), p(1.0, 0.0)),
                line(p(1.0, 0.0), p(1.0, 1.0)),
                line(p(1.0, 1.0), p(0.0, 1e-10)),
            ],
            true,
        );
        assert_eq!(already_closed.len(), 4);
    }

    #[test]
    fn disconnected_segment_is_bridged() {
        let chain = stitch(
            &[
                line(p(0.0, 0.0), p(1.0, 0.0)),
                line(p(1.0, 0.0), p(2.0, 0.0)),
                line(p(5.0, 0.0), p(3.0, 0.0)),
            ],
            false,
        );
        assert_eq!(
            positions(&chain),
            vec![p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0), p(3.0, 0.0), p(5.0, 0.0)]
        );
    }

    #[test]
    fn runs_alternate_between_polylines_and_arcs() {
        let segments = [
            line(p(0.0, 0.0), p(1.0, 0.0)),
            line(p(1.0, 0.0), p(2.0, 0.0)),
            Segment::Arc {
                start: p(2.0, 0.0),
                mid: p(3.0, 1.0),
                end: p(4.0, 0.0),
            },
            line(p(4.0, 0.0), p(5.0, 0.0)),
        ];
        let pieces = split_runs(&stitch(&segments, false));
        assert_eq!(
            pieces,
            vec![
                ChainPiece::Straight(vec![p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0)]),
                ChainPiece::Arc {
                    start: p(2.0, 0.0),
                    mid: p(3.0, 1.0),
                    end: p(4.0, 0.0),
                },
                ChainPiece::Straight(vec![p(4.0, 0.0), p(5.0, 0.0)]),
            ]
        );
    }

    #[test]
    fn leading_arc_emits_no_empty_run() {
        let segments = [Segment::Arc {
            start: p(0.0, 0.0),
            mid: p(1.0, 1.0),
            end: p(2.0, 0.0),
        }];
        let pieces = split_runs(&stitch(&segments, false));
        assert_eq!(pieces.len(), 1);
        assert!(matches!(pieces[0], ChainPiece::Arc { .. }));
    }
}
