//! Triangle soup repair and orientation.
//!
//! Runs before a soup is turned into a half-edge mesh:
//!
//! - [`repair_soup`] merges points with identical coordinates and drops rows
//!   that cannot form a triangle, duplicated triangles and unreferenced
//!   points.
//! - [`orient_soup`] flips triangles so that neighbours agree on orientation
//!   and reports whether the soup is an orientable 2-manifold.

use std::collections::{HashMap, HashSet, VecDeque};

use nalgebra::Point3;

use crate::error::{MeshError, Result};
use crate::soup::PolygonSoup;

/// What [`repair_soup`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Points folded into an earlier point with the same coordinates.
    pub merged_points: usize,
    /// Rows referencing a point that does not exist.
    pub invalid_faces: usize,
    /// Rows that repeat a point once duplicates are merged.
    pub degenerate_faces: usize,
    /// Rows over the same three points as an earlier row, in any order.
    pub duplicate_faces: usize,
    /// Points no remaining row references.
    pub unreferenced_points: usize,
}

impl RepairReport {
    /// Returns `true` if the soup needed no repair.
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

fn point_key(p: &Point3<f64>) -> [u64; 3] {
    // +0.0 and -0.0 compare equal, so they must share a key.
    let bits = |x: f64| if x == 0.0 { 0.0f64.to_bits() } else { x.to_bits() };
    [bits(p.x), bits(p.y), bits(p.z)]
}

/// Clean a soup. Surviving points and rows keep their relative order.
pub fn repair_soup(soup: &PolygonSoup) -> (PolygonSoup, RepairReport) {
    let mut report = RepairReport::default();

    // Merge points with identical coordinates into their first occurrence.
    let mut first: HashMap<[u64; 3], usize> = HashMap::new();
    let mut canonical: Vec<usize> = Vec::with_capacity(soup.vertices.len());
    for (i, p) in soup.vertices.iter().enumerate() {
        let c = *first.entry(point_key(p)).or_insert(i);
        if c != i {
            report.merged_points += 1;
        }
        canonical.push(c);
    }

    let mut seen: HashSet<[usize; 3]> = HashSet::new();
    let mut faces: Vec<[usize; 3]> = Vec::with_capacity(soup.faces.len());
    for face in &soup.faces {
        if face.iter().any(|&v| v >= soup.vertices.len()) {
            report.invalid_faces += 1;
            continue;
        }
        let f = face.map(|v| canonical[v]);
        if f[0] == f[1] || f[1] == f[2] || f[0] == f[2] {
            report.degenerate_faces += 1;
            continue;
        }
        let mut key = f;
        key.sort_unstable();
        if !seen.insert(key) {
            report.duplicate_faces += 1;
            continue;
        }
        faces.push(f);
    }

    // Compact points, keeping the referenced ones in input order.
    let mut used = vec![false; soup.vertices.len()];
    for f in &faces {
        for &v in f {
            used[v] = true;
        }
    }
    let mut remap = vec![usize::MAX; soup.vertices.len()];
    let mut vertices = Vec::new();
    for (i, p) in soup.vertices.iter().enumerate() {
        if used[i] {
            remap[i] = vertices.len();
            vertices.push(*p);
        } else if canonical[i] == i {
            report.unreferenced_points += 1;
        }
    }
    for f in faces.iter_mut() {
        *f = f.map(|v| remap[v]);
    }

    if !report.is_clean() {
        log::debug!("soup repair: {:?}", report);
    }
    (PolygonSoup::new(vertices, faces), report)
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn has_directed_edge(face: &[usize; 3], a: usize, b: usize) -> bool {
    (0..3).any(|i| face[i] == a && face[(i + 1) % 3] == b)
}

/// Orient a soup consistently, one connected component at a time.
///
/// The first row of each component keeps its orientation. Returns `false` if
/// some edge has more than two triangles, the soup is not orientable, or a
/// point joins several separate fans of triangles. The soup is still
/// reoriented as far as possible in that case.
pub fn orient_soup(soup: &mut PolygonSoup) -> bool {
    let mut edge_faces: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for (fi, f) in soup.faces.iter().enumerate() {
        for i in 0..3 {
            edge_faces.entry(edge_key(f[i], f[(i + 1) % 3])).or_default().push(fi);
        }
    }
    let manifold_edges = edge_faces.values().all(|fs| fs.len() <= 2);

    let mut orientable = true;
    let mut visited = vec![false; soup.faces.len()];
    let mut queue = VecDeque::new();
    for seed in 0..soup.faces.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        queue.push_back(seed);

        while let Some(fi) = queue.pop_front() {
            let face = soup.faces[fi];
            for i in 0..3 {
                let (a, b) = (face[i], face[(i + 1) % 3]);
                let Some(adjacent) = edge_faces.get(&edge_key(a, b)) else {
                    continue;
                };
                if adjacent.len() != 2 {
                    continue;
                }
                for &g in adjacent {
                    if g == fi {
                        continue;
                    }
                    let consistent = !has_directed_edge(&soup.faces[g], a, b);
                    if !visited[g] {
                        if !consistent {
                            let [x, y, z] = soup.faces[g];
                            soup.faces[g] = [x, z, y];
                        }
                        visited[g] = true;
                        queue.push_back(g);
                    } else if !consistent {
                        orientable = false;
                    }
                }
            }
        }
    }

    let manifold_vertices = vertices_are_manifold(soup);
    if !orientable {
        log::debug!("soup is not orientable");
    }
    manifold_edges && orientable && manifold_vertices
}

/// Orient a copy of `soup`, failing with [`MeshError::NonOrientable`] when
/// [`orient_soup`] reports anything but an orientable 2-manifold.
pub fn oriented(soup: &PolygonSoup) -> Result<PolygonSoup> {
    let mut out = soup.clone();
    if orient_soup(&mut out) {
        Ok(out)
    } else {
        Err(MeshError::NonOrientable)
    }
}

/// Checks that the triangles around every point form a single fan.
fn vertices_are_manifold(soup: &PolygonSoup) -> bool {
    let mut incident: Vec<Vec<usize>> = vec![Vec::new(); soup.vertices.len()];
    for (fi, f) in soup.faces.iter().enumerate() {
        for &v in f {
            incident[v].push(fi);
        }
    }

    for (v, faces) in incident.iter().enumerate() {
        if faces.len() < 2 {
            continue;
        }
        // Faces around v are adjacent when they share another corner.
        let mut by_corner: HashMap<usize, Vec<usize>> = HashMap::new();
        for (local, &fi) in faces.iter().enumerate() {
            for &w in &soup.faces[fi] {
                if w != v {
                    by_corner.entry(w).or_default().push(local);
                }
            }
        }

        let mut reached = vec![false; faces.len()];
        let mut stack = vec![0];
        reached[0] = true;
        let mut count = 1;
        while let Some(local) = stack.pop() {
            for &w in &soup.faces[faces[local]] {
                if w == v {
                    continue;
                }
                for &other in &by_corner[&w] {
                    if !reached[other] {
                        reached[other] = true;
                        count += 1;
                        stack.push(other);
                    }
                }
            }
        }
        if count != faces.len() {
            log::debug!("point {} joins several triangle fans", v);
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(x, y, z)
    }

    #[test]
    fn test_clean_soup_untouched() {
        let soup = PolygonSoup::new(
            vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(0.0, 1.0, 0.0)],
            vec![[0, 1, 2], [0, 2, 3]],
        );
        let (cleaned, report) = repair_soup(&soup);
        assert!(report.is_clean());
        assert_eq!(cleaned, soup);
    }

    #[test]
    fn test_merges_duplicate_points() {
        // Point 3 duplicates point 0 (with a negative zero).
        let soup = PolygonSoup::new(
            vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(-0.0, 0.0, 0.0), p(0.0, 1.0, 0.0)],
            vec![[0, 1, 2], [3, 2, 4]],
        );
        let (cleaned, report) = repair_soup(&soup);
        assert_eq!(report.merged_points, 1);
        assert_eq!(cleaned.num_vertices(), 4);
        assert_eq!(cleaned.faces, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_drops_bad_rows_and_points() {
        let soup = PolygonSoup::new(
            vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0), p(5.0, 5.0, 5.0)],
            vec![[0, 1, 2], [0, 0, 1], [2, 1, 0], [1, 2, 0], [0, 1, 9]],
        );
        let (cleaned, report) = repair_soup(&soup);
        assert_eq!(report.degenerate_faces, 1);
        assert_eq!(report.duplicate_faces, 2);
        assert_eq!(report.invalid_faces, 1);
        assert_eq!(report.unreferenced_points, 1);
        assert_eq!(cleaned.faces, vec![[0, 1, 2]]);
        assert_eq!(cleaned.num_vertices(), 3);
    }

    #[test]
    fn test_orient_flips_inconsistent_row() {
        let mut soup = PolygonSoup::new(
            vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(0.0, 1.0, 0.0)],
            vec![[0, 1, 2], [0, 3, 2]],
        );
        assert!(orient_soup(&mut soup));
        assert_eq!(soup.faces, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_mobius_strip_is_not_orientable() {
        let vertices = (0..5).map(|i| p(i as f64, (i * i) as f64, 0.0)).collect();
        let mut soup = PolygonSoup::new(
            vertices,
            vec![[0, 1, 2], [1, 2, 3], [2, 3, 4], [3, 4, 0], [4, 0, 1]],
        );
        assert!(!orient_soup(&mut soup));
    }

    #[test]
    fn test_oriented_reports_failure() {
        let vertices = (0..5).map(|i| p(i as f64, (i * i) as f64, 0.0)).collect();
        let strip = PolygonSoup::new(
            vertices,
            vec![[0, 1, 2], [1, 2, 3], [2, 3, 4], [3, 4, 0], [4, 0, 1]],
        );
        assert_eq!(oriented(&strip), Err(MeshError::NonOrientable));

        let quad = PolygonSoup::new(
            vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(0.0, 1.0, 0.0)],
            vec![[0, 1, 2], [0, 3, 2]],
        );
        assert_eq!(oriented(&quad).unwrap().faces, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_non_manifold_edge() {
        let mut soup = PolygonSoup::new(
            vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0), p(0.0, -1.0, 0.0), p(0.0, 0.0, 1.0)],
            vec![[0, 1, 2], [1, 0, 3], [0, 1, 4]],
        );
        assert!(!orient_soup(&mut soup));
    }

    #[test]
    fn test_bowtie_vertex() {
        let mut soup = PolygonSoup::new(
            vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(-1.0, 0.0, 0.0), p(-1.0, -1.0, 0.0)],
            vec![[0, 1, 2], [0, 3, 4]],
        );
        assert!(!orient_soup(&mut soup));
    }
}
