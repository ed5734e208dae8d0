//! Raster to polygon conversion
//!
//! Regions are 4-connected groups of cells sharing a non-zero value. Their
//! outlines are traced along cell edges in pixel space, so every vertex is
//! a cell corner, and then mapped through the geotransform.

use basinkit_core::raster::Raster;
use basinkit_core::{Error, Result};
use geo::{Contains, Coord, LineString, Point, Polygon};
use ndarray::Array2;
use std::collections::{HashMap, VecDeque};

type Vertex = (i64, i64);
type Dir = (i64, i64);

const NO_LABEL: u32 = u32::MAX;

/// Polygons of every non-zero region of a mask, as `(value, polygon)`.
///
/// Regions are listed in scan order of their first cell. Holes are kept as
/// interior rings, and the polygon area of a region equals its cell count
/// times the cell area.
pub fn polygonize(mask: &Raster<u8>) -> Result<Vec<(u8, Polygon<f64>)>> {
    let (labels, values) = label_regions(mask);
    let transform = *mask.transform();

    let mut out = Vec::new();
    for (label, &value) in values.iter().enumerate() {
        let rings = trace_rings(&labels, label as u32)?;
        for (exterior, holes) in assemble(rings)? {
            // Pixel rings run clockwise on the map; reverse them so exteriors
            // are counter-clockwise
            let to_geo = |ring: &[Vertex]| -> LineString<f64> {
                ring.iter()
                    .rev()
                    .map(|&(x, y)| {
                        let (gx, gy) = transform.apply(x as f64, y as f64);
                        Coord { x: gx, y: gy }
                    })
                    .collect()
            };
            let interiors = holes.iter().map(|h| to_geo(h.as_slice())).collect();
            out.push((value, Polygon::new(to_geo(&exterior), interiors)));
        }
    }

    Ok(out)
}

/// 4-connected component labels (NO_LABEL for zero cells) and the value of
/// each component
fn label_regions(mask: &Raster<u8>) -> (Array2<u32>, Vec<u8>) {
    let (rows, cols) = mask.shape();
    let data = mask.data();
    let mut labels = Array2::from_elem((rows, cols), NO_LABEL);
    let mut values = Vec::new();
    let mut queue = VecDeque::new();

    for row in 0..rows {
        for col in 0..cols {
            let value = data[(row, col)];
            if value == 0 || labels[(row, col)] != NO_LABEL {
                continue;
            }
            let label = values.len() as u32;
            values.push(value);
            labels[(row, col)] = label;
            queue.push_back((row, col));

            while let Some((r, c)) = queue.pop_front() {
                let candidates = [
                    (r.wrapping_sub(1), c),
                    (r + 1, c),
                    (r, c.wrapping_sub(1)),
                    (r, c + 1),
                ];
                for (nr, nc) in candidates {
                    if nr < rows && nc < cols && labels[(nr, nc)] == NO_LABEL && data[(nr, nc)] == value
                    {
                        labels[(nr, nc)] = label;
                        queue.push_back((nr, nc));
                    }
                }
            }
        }
    }

    (labels, values)
}

fn right(d: Dir) -> Dir {
    (-d.1, d.0)
}

fn left(d: Dir) -> Dir {
    (d.1, -d.0)
}

/// Closed rings (first vertex repeated last) around one labelled region.
///
/// Edges are directed with the region on their right in pixel space
/// (x = col, y = row, y down). At a vertex shared by two edge pairs the
/// walk prefers a right turn, then straight on, then a left turn.
fn trace_rings(labels: &Array2<u32>, label: u32) -> Result<Vec<Vec<Vertex>>> {
    let (rows, cols) = labels.dim();
    let inside = |r: i64, c: i64| {
        r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols && labels[(r as usize, c as usize)] == label
    };

    let mut edges: Vec<(Vertex, Dir)> = Vec::new();
    for ((r, c), &l) in labels.indexed_iter() {
        if l != label {
            continue;
        }
        let (r, c) = (r as i64, c as i64);
        if !inside(r - 1, c) {
            edges.push(((c, r), (1, 0)));
        }
        if !inside(r, c + 1) {
            edges.push(((c + 1, r), (0, 1)));
        }
        if !inside(r + 1, c) {
            edges.push(((c + 1, r + 1), (-1, 0)));
        }
        if !inside(r, c - 1) {
            edges.push(((c, r + 1), (0, -1)));
        }
    }

    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (i, &(start, _)) in edges.iter().enumerate() {
        outgoing.entry(start).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for first in 0..edges.len() {
        if used[first] {
            continue;
        }
        used[first] = true;
        let (origin, first_dir) = edges[first];
        let mut dir = first_dir;
        let mut at = (origin.0 + dir.0, origin.1 + dir.1);
        let mut ring = vec![origin];

        while at != origin {
            let candidates = outgoing.get(&at).map(Vec::as_slice).unwrap_or(&[]);
            let next = [right(dir), dir, left(dir)].into_iter().find_map(|want| {
                candidates
                    .iter()
                    .copied()
                    .find(|&e| !used[e] && edges[e].1 == want)
            });
            let Some(next) = next else {
                return Err(Error::Algorithm(format!(
                    "open boundary at pixel corner ({}, {})",
                    at.0, at.1
                )));
            };
            used[next] = true;
            let next_dir = edges[next].1;
            if next_dir != dir {
                ring.push(at);
            }
            dir = next_dir;
            at = (at.0 + dir.0, at.1 + dir.1);
        }

        // Drop the origin when it sits in the middle of a straight run
        if dir == first_dir {
            ring.remove(0);
        }
        if let Some(&start) = ring.first() {
            ring.push(start);
        }
        rings.push(ring);
    }

    Ok(rings)
}

/// Twice the signed shoelace area; positive for exterior rings in pixel space
fn signed_area2(ring: &[Vertex]) -> i64 {
    ring.windows(2)
        .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
        .sum()
}

fn pixel_polygon(ring: &[Vertex]) -> Polygon<f64> {
    let ls: LineString<f64> = ring
        .iter()
        .map(|&(x, y)| Coord {
            x: x as f64,
            y: y as f64,
        })
        .collect();
    Polygon::new(ls, vec![])
}

/// Centre of the cell left of a hole ring's first edge, which lies in the hole
fn hole_probe(ring: &[Vertex]) -> Point<f64> {
    let (a, b) = (ring[0], ring[1]);
    let d = ((b.0 - a.0).signum(), (b.1 - a.1).signum());
    let l = left(d);
    Point::new(
        a.0 as f64 + 0.5 * (d.0 + l.0) as f64,
        a.1 as f64 + 0.5 * (d.1 + l.1) as f64,
    )
}

/// Pair every hole ring with the exterior ring that encloses it
#[allow(clippy::type_complexity)]
fn assemble(rings: Vec<Vec<Vertex>>) -> Result<Vec<(Vec<Vertex>, Vec<Vec<Vertex>>)>> {
    let (exteriors, holes): (Vec<_>, Vec<_>) =
        rings.into_iter().partition(|r| signed_area2(r) > 0);

    let mut polygons: Vec<(Vec<Vertex>, Vec<Vec<Vertex>>)> =
        exteriors.into_iter().map(|e| (e, Vec::new())).collect();
    if polygons.is_empty() {
        return Ok(polygons);
    }

    if polygons.len() == 1 {
        polygons[0].1 = holes;
        return Ok(polygons);
    }

    let shapes: Vec<Polygon<f64>> = polygons.iter().map(|(e, _)| pixel_polygon(e)).collect();
    for hole in holes {
        let probe = hole_probe(&hole);
        let owner = shapes
            .iter()
            .position(|s| s.contains(&probe))
            .ok_or_else(|| Error::Algorithm("hole ring outside every exterior".into()))?;
        polygons[owner].1.push(hole);
    }

    Ok(polygons)
}
