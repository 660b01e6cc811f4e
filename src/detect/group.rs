//! Clustering of raw multi-scale hits into final detections.
//!
//! Follows the classic `groupRectangles` rules: hits are partitioned into
//! classes of similar rectangles, classes with too few members are dropped,
//! and small survivors nested inside a stronger detection are removed.

use super::FaceRect;

/// Relative tolerance for two hits to count as the same face.
pub const GROUP_EPS: f32 = 0.2;

fn similar(a: &FaceRect, b: &FaceRect, eps: f32) -> bool {
    let delta = eps * (a.width.min(b.width) + a.height.min(b.height)) as f32 * 0.5;
    let close = |p: u32, q: u32| (p as f32 - q as f32).abs() <= delta;
    close(a.x, b.x)
        && close(a.y, b.y)
        && close(a.x + a.width, b.x + b.width)
        && close(a.y + a.height, b.y + b.height)
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Merge raw hits; a group survives when it has more than `min_neighbors` members.
///
/// `min_neighbors == 0` returns the input unchanged.
pub fn group_rectangles(rects: &[FaceRect], min_neighbors: u32, eps: f32) -> Vec<FaceRect> {
    if min_neighbors == 0 || rects.is_empty() {
        return rects.to_vec();
    }

    let n = rects.len();
    let mut parent: Vec<usize> = (0..n).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            if similar(&rects[i], &rects[j], eps) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    // Per-class sums: x, y, w, h, count.
    let mut sums: Vec<[u64; 5]> = vec![[0; 5]; n];
    for (i, r) in rects.iter().enumerate() {
        let root = find(&mut parent, i);
        let s = &mut sums[root];
        s[0] += r.x as u64;
        s[1] += r.y as u64;
        s[2] += r.width as u64;
        s[3] += r.height as u64;
        s[4] += 1;
    }

    let classes: Vec<(FaceRect, u32)> = sums
        .iter()
        .filter(|s| s[4] > 0)
        .map(|s| {
            let count = s[4] as f64;
            let avg = |v: u64| (v as f64 / count).round() as u32;
            (
                FaceRect::new(avg(s[0]), avg(s[1]), avg(s[2]), avg(s[3])),
                s[4] as u32,
            )
        })
        .filter(|(_, count)| *count > min_neighbors)
        .collect();

    let mut kept = Vec::with_capacity(classes.len());
    for (i, (r1, n1)) in classes.iter().enumerate() {
        let nested = classes.iter().enumerate().any(|(j, (r2, n2))| {
            if i == j {
                return false;
            }
            let dx = (r2.width as f32 * eps).round() as i64;
            let dy = (r2.height as f32 * eps).round() as i64;
            let inside = r1.x as i64 >= r2.x as i64 - dx
                && r1.y as i64 >= r2.y as i64 - dy
                && (r1.x + r1.width) as i64 <= (r2.x + r2.width) as i64 + dx
                && (r1.y + r1.height) as i64 <= (r2.y + r2.height) as i64 + dy;
            inside && (*n2 > (*n1).max(3) || *n1 < 3)
        });
        if !nested {
            kept.push(*r1);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(x: u32, y: u32, size: u32, count: u32) -> Vec<FaceRect> {
        (0..count)
            .map(|i| FaceRect::new(x + i % 2, y + (i / 2) % 2, size, size))
            .collect()
    }

    #[test]
    fn test_zero_threshold_passthrough() {
        let rects = cluster(10, 10, 40, 3);
        assert_eq!(group_rectangles(&rects, 0, GROUP_EPS), rects);
    }

    #[test]
    fn test_weak_groups_rejected() {
        // Six hits are not more than six neighbours.
        let rects = cluster(10, 10, 40, 6);
        assert!(group_rectangles(&rects, 6, GROUP_EPS).is_empty());

        let rects = cluster(10, 10, 40, 7);
        assert_eq!(group_rectangles(&rects, 6, GROUP_EPS).len(), 1);
    }

    #[test]
    fn test_separate_faces_stay_separate() {
        let mut rects = cluster(10, 10, 40, 8);
        rects.extend(cluster(200, 120, 40, 8));
        let grouped = group_rectangles(&rects, 6, GROUP_EPS);
        assert_eq!(grouped.len(), 2);
        assert!(grouped.iter().any(|r| r.x < 20));
        assert!(grouped.iter().any(|r| r.x >= 200));
    }

    #[test]
    fn test_group_average() {
        let rects = vec![
            FaceRect::new(10, 10, 40, 40),
            FaceRect::new(12, 12, 40, 40),
        ];
        let grouped = group_rectangles(&rects, 1, GROUP_EPS);
        assert_eq!(grouped, vec![FaceRect::new(11, 11, 40, 40)]);
    }

    #[test]
    fn test_nested_weak_detection_removed() {
        let mut rects = cluster(100, 100, 100, 12);
        // A small face-sized blob inside the big one, with fewer hits.
        rects.extend(cluster(130, 130, 30, 4));
        let grouped = group_rectangles(&rects, 2, GROUP_EPS);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].width, 100);
    }
}
