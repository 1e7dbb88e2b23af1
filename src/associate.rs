use std::collections::HashSet;

use pathfinding::prelude::{Matrix, kuhn_munkres_min};
use tracing::trace;

use crate::{config::AssignmentStrategy, detection::Detection, track::Track};

// The hungarian solver only accepts integer weights, so IoU values are
// scaled up and truncated.
const IOU_MULTIPLIER: f64 = 10000.0;

// Weight of a pair that may never be matched. Larger than any
// combination of valid negative IoU weights.
const FORBIDDEN: i64 = 100 * IOU_MULTIPLIER as i64;

/// Outcome of pairing one batch of detections against the current tracks.
///
/// `matched` holds `(detection_index, track_index)` pairs. Every index appears
/// in at most one pair.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub matched: Vec<(usize, usize)>,
    pub unmatched_detections: Vec<usize>,
    pub unmatched_tracks: Vec<usize>,
}

/// Associates the given detections to the given tracks.
///
/// ## Args
///  - detections: The validated detections of one batch.
///  - tracks: All live tracks, in store order.
///  - iou_threshold: The minimum iou score needed for a valid association.
///  - strategy: Greedy per-detection matching or a global assignment.
///
/// Only tracks of the same class as a detection are candidates, and a pair
/// needs an IoU of at least `iou_threshold` between the detection box and the
/// track's `target`.
pub fn associate<D, T>(
    detections: &[D],
    tracks: &[T],
    iou_threshold: f64,
    strategy: AssignmentStrategy,
) -> Assignment
where
    D: AsRef<Detection>,
    T: AsRef<Track>,
{
    match strategy {
        AssignmentStrategy::Greedy => greedy_associate(detections, tracks, iou_threshold),
        AssignmentStrategy::Optimal => optimal_associate(detections, tracks, iou_threshold),
    }
}

/// Greedy class gated matching.
///
/// ## Args
///  - detections: The validated detections of one batch.
///  - tracks: All live tracks, in store order.
///  - iou_threshold: The minimum iou score needed for a valid association.
///
/// Detections are visited in input order and each takes the unmatched
/// same-class track with the highest IoU. On equal IoU the track that comes
/// first wins.
pub fn greedy_associate<D, T>(detections: &[D], tracks: &[T], iou_threshold: f64) -> Assignment
where
    D: AsRef<Detection>,
    T: AsRef<Track>,
{
    let mut taken: HashSet<usize> = HashSet::new();
    let mut assignment = Assignment::default();

    for (i, detection) in detections.iter().map(|d| d.as_ref()).enumerate() {
        let mut best: Option<(usize, f64)> = None;

        for (j, track) in tracks.iter().map(|t| t.as_ref()).enumerate() {
            if taken.contains(&j) || track.class != detection.class {
                continue;
            }
            let iou = track.target.iou(&detection.bbox);
            if iou > best.map_or(0.0, |(_, best_iou)| best_iou) {
                best = Some((j, iou));
            }
        }

        match best {
            Some((j, iou)) if iou >= iou_threshold => {
                trace!(detection = i, track = tracks[j].as_ref().id, iou, "matched");
                taken.insert(j);
                assignment.matched.push((i, j));
            }
            _ => assignment.unmatched_detections.push(i),
        }
    }

    assignment.unmatched_tracks = (0..tracks.len()).filter(|j| !taken.contains(j)).collect();
    assignment
}

/// Globally optimal class gated matching via the hungarian algorithm.
///
/// ## Args
///  - detections: The validated detections of one batch.
///  - tracks: All live tracks, in store order.
///  - iou_threshold: The minimum iou score needed for a valid association.
///
/// Pairs below `iou_threshold` carry no weight, so the solver never trades a
/// valid match for several that would be rejected afterwards.
pub fn optimal_associate<D, T>(detections: &[D], tracks: &[T], iou_threshold: f64) -> Assignment
where
    D: AsRef<Detection>,
    T: AsRef<Track>,
{
    if detections.is_empty() || tracks.is_empty() {
        return Assignment {
            matched: Vec::new(),
            unmatched_detections: (0..detections.len()).collect(),
            unmatched_tracks: (0..tracks.len()).collect(),
        };
    }

    let iou_matrix = calc_iou_matrix(detections, tracks);
    let cost_matrix = calc_cost_matrix(detections, tracks, &iou_matrix, iou_threshold);

    // kuhn_munkres needs at least as many columns as rows
    let transpose = cost_matrix.rows > cost_matrix.columns;
    let transposed;
    let weights = if transpose {
        transposed = cost_matrix.transposed();
        &transposed
    } else {
        &cost_matrix
    };
    let assignment_vector = kuhn_munkres_min(weights).1;

    let mut matched: Vec<(usize, usize)> = assignment_vector
        .iter()
        .enumerate()
        .map(|(row, &column)| if transpose { (column, row) } else { (row, column) })
        .filter(|&(i, j)| {
            let same_class = detections[i].as_ref().class == tracks[j].as_ref().class;
            let iou = iou_matrix[(i, j)];
            same_class && iou > 0.0 && iou >= iou_threshold
        })
        .collect();
    matched.sort_unstable();

    let matched_detections: HashSet<usize> = matched.iter().map(|&(i, _)| i).collect();
    let matched_tracks: HashSet<usize> = matched.iter().map(|&(_, j)| j).collect();

    Assignment {
        unmatched_detections: (0..detections.len())
            .filter(|i| !matched_detections.contains(i))
            .collect(),
        unmatched_tracks: (0..tracks.len())
            .filter(|j| !matched_tracks.contains(j))
            .collect(),
        matched,
    }
}

fn calc_iou_matrix<D, T>(detections: &[D], tracks: &[T]) -> Matrix<f64>
where
    D: AsRef<Detection>,
    T: AsRef<Track>,
{
    let mut matrix = Matrix::new(detections.len(), tracks.len(), 0.0);

    for (i, detection) in detections.iter().enumerate() {
        for (j, track) in tracks.iter().enumerate() {
            matrix[(i, j)] = track.as_ref().target.iou(&detection.as_ref().bbox);
        }
    }

    matrix
}

fn calc_cost_matrix<D, T>(
    detections: &[D],
    tracks: &[T],
    iou_matrix: &Matrix<f64>,
    iou_threshold: f64,
) -> Matrix<i64>
where
    D: AsRef<Detection>,
    T: AsRef<Track>,
{
    let mut matrix = Matrix::new(detections.len(), tracks.len(), 0);

    for (i, detection) in detections.iter().enumerate() {
        for (j, track) in tracks.iter().enumerate() {
            let iou = iou_matrix[(i, j)];
            matrix[(i, j)] = if detection.as_ref().class != track.as_ref().class {
                FORBIDDEN
            } else if iou < iou_threshold {
                0
            } else {
                -(iou * IOU_MULTIPLIER) as i64
            };
        }
    }

    matrix
}
