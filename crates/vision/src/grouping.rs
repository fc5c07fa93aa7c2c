//! Merging of overlapping raw detections, after OpenCV's `groupRectangles`.

use crate::detector::Region;

/// Relative tolerance used when deciding two hits are the same object.
pub const GROUP_EPS: f64 = 0.2;

fn similar(a: &Region, b: &Region, eps: f64) -> bool {
    let delta = eps
        * (a.width.min(b.width) as f64 + a.height.min(b.height) as f64)
        * 0.5;
    let close = |p: u32, q: u32| (p as f64 - q as f64).abs() <= delta;
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

/// Clusters similar rectangles, averages each cluster and keeps clusters with
/// more than `min_neighbors` members. Clusters nested inside a stronger one
/// are dropped. With `min_neighbors == 0` the input is returned unchanged.
pub fn group_rectangles(rects: &[Region], min_neighbors: u32, eps: f64) -> Vec<Region> {
    if min_neighbors == 0 || rects.is_empty() {
        return rects.to_vec();
    }

    let mut parent: Vec<usize> = (0..rects.len()).collect();
    for i in 0..rects.len() {
        for j in 0..i {
            if similar(&rects[i], &rects[j], eps) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[a] = b;
                }
            }
        }
    }

    let mut sums: Vec<([u64; 4], u32)> = Vec::new();
    let mut class_of_root = vec![usize::MAX; rects.len()];
    for (i, rect) in rects.iter().enumerate() {
        let root = find(&mut parent, i);
        if class_of_root[root] == usize::MAX {
            class_of_root[root] = sums.len();
            sums.push(([0; 4], 0));
        }
        let (sum, count) = &mut sums[class_of_root[root]];
        sum[0] += rect.x as u64;
        sum[1] += rect.y as u64;
        sum[2] += rect.width as u64;
        sum[3] += rect.height as u64;
        *count += 1;
    }

    let averaged: Vec<(Region, u32)> = sums
        .iter()
        .map(|(sum, count)| {
            let avg = |v: u64| (v as f64 / *count as f64).round() as u32;
            (
                Region::new(avg(sum[0]), avg(sum[1]), avg(sum[2]), avg(sum[3])),
                *count,
            )
        })
        .collect();

    averaged
        .iter()
        .enumerate()
        .filter(|(_, (_, n))| *n > min_neighbors)
        .filter(|(i, (inner, n1))| {
            !averaged.iter().enumerate().any(|(j, (outer, n2))| {
                if j == *i || *n2 <= min_neighbors {
                    return false;
                }
                let dx = (outer.width as f64 * eps).round() as i64;
                let dy = (outer.height as f64 * eps).round() as i64;
                let (ix, iy) = (inner.x as i64, inner.y as i64);
                let (ox, oy) = (outer.x as i64, outer.y as i64);
                ix >= ox - dx
                    && iy >= oy - dy
                    && ix + inner.width as i64 <= ox + outer.width as i64 + dx
                    && iy + inner.height as i64 <= oy + outer.height as i64 + dy
                    && (*n2 > (*n1).max(3) || *n1 < 3)
            })
        })
        .map(|(_, (region, _))| *region)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_cluster_and_drops_weak_hits() {
        let rects = [
            Region::new(10, 10, 20, 20),
            Region::new(11, 10, 20, 21),
            Region::new(12, 11, 19, 20),
            Region::new(80, 80, 20, 20),
        ];
        let grouped = group_rectangles(&rects, 2, GROUP_EPS);
        assert_eq!(grouped, vec![Region::new(11, 10, 20, 20)]);
    }

    #[test]
    fn zero_neighbors_keeps_raw_hits() {
        let rects = [Region::new(0, 0, 5, 5), Region::new(1, 1, 5, 5)];
        assert_eq!(group_rectangles(&rects, 0, GROUP_EPS), rects.to_vec());
    }

    #[test]
    fn drops_weaker_nested_cluster() {
        let mut rects = vec![Region::new(0, 0, 50, 50); 6];
        rects.extend(vec![Region::new(10, 10, 10, 10); 2]);
        let grouped = group_rectangles(&rects, 1, GROUP_EPS);
        assert_eq!(grouped, vec![Region::new(0, 0, 50, 50)]);
    }

    #[test]
    fn separate_objects_stay_separate() {
        let mut rects = vec![Region::new(0, 0, 20, 20); 3];
        rects.extend(vec![Region::new(100, 0, 20, 20); 3]);
        assert_eq!(group_rectangles(&rects, 2, GROUP_EPS).len(), 2);
    }
}
