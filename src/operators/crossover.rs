//! Crossover operators.
//!
//! Every operator takes two parents of the same length and returns two children.
//! Parents of different length fail with [`GeneticError::ShapeMismatch`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::Bounds;
use crate::chromosome::ensure_same_shape;
use crate::error::{GeneticError, Result};
use crate::rng::RandomNumberGenerator;

/// Swaps the tails of both parents after a single random cut point.
pub fn single_point<T: Clone>(
    a: &[T],
    b: &[T],
    rng: &mut RandomNumberGenerator,
) -> Result<(Vec<T>, Vec<T>)> {
    ensure_same_shape(a.len(), b.len())?;
    let cut = rng.gen_index(a.len() + 1);

    let mut child1 = a[..cut].to_vec();
    child1.extend_from_slice(&b[cut..]);
    let mut child2 = b[..cut].to_vec();
    child2.extend_from_slice(&a[cut..]);

    Ok((child1, child2))
}

/// Alternates parent segments between `points` distinct cut points.
pub fn multi_point<T: Clone>(
    a: &[T],
    b: &[T],
    points: usize,
    rng: &mut RandomNumberGenerator,
) -> Result<(Vec<T>, Vec<T>)> {
    ensure_same_shape(a.len(), b.len())?;
    if a.len() < 2 || points == 0 {
        return Ok((a.to_vec(), b.to_vec()));
    }

    let points = points.min(a.len() - 1);
    let mut cuts = BTreeSet::new();
    while cuts.len() < points {
        cuts.insert(1 + rng.gen_index(a.len() - 1));
    }

    let mut child1 = Vec::with_capacity(a.len());
    let mut child2 = Vec::with_capacity(b.len());
    let mut swapped = false;
    for i in 0..a.len() {
        if cuts.contains(&i) {
            swapped = !swapped;
        }
        if swapped {
            child1.push(b[i].clone());
            child2.push(a[i].clone());
        } else {
            child1.push(a[i].clone());
            child2.push(b[i].clone());
        }
    }

    Ok((child1, child2))
}

/// Exchanges every gene independently with probability `swap_probability`.
pub fn uniform<T: Clone>(
    a: &[T],
    b: &[T],
    swap_probability: f64,
    rng: &mut RandomNumberGenerator,
) -> Result<(Vec<T>, Vec<T>)> {
    ensure_same_shape(a.len(), b.len())?;
    let mut child1 = a.to_vec();
    let mut child2 = b.to_vec();

    for i in 0..a.len() {
        if rng.gen_bool(swap_probability) {
            std::mem::swap(&mut child1[i], &mut child2[i]);
        }
    }

    Ok((child1, child2))
}

/// Weighted average of both parents: `w*a + (1-w)*b` and `(1-w)*a + w*b`.
pub fn arithmetic(a: &[f64], b: &[f64], weight: f64) -> Result<(Vec<f64>, Vec<f64>)> {
    ensure_same_shape(a.len(), b.len())?;
    let w = weight.clamp(0.0, 1.0);
    let child1 = a.iter().zip(b).map(|(x, y)| w * x + (1.0 - w) * y).collect();
    let child2 = a.iter().zip(b).map(|(x, y)| (1.0 - w) * x + w * y).collect();
    Ok((child1, child2))
}

/// Simulated binary crossover (Deb & Agrawal).
///
/// `eta` is the distribution index: larger values keep children closer to their
/// parents. Each gene pair is recombined with probability `gene_probability`.
pub fn simulated_binary(
    a: &[f64],
    b: &[f64],
    eta: f64,
    gene_probability: f64,
    bounds: Bounds,
    rng: &mut RandomNumberGenerator,
) -> Result<(Vec<f64>, Vec<f64>)> {
    ensure_same_shape(a.len(), b.len())?;
    let mut child1 = a.to_vec();
    let mut child2 = b.to_vec();

    for i in 0..a.len() {
        if !rng.gen_bool(gene_probability) {
            continue;
        }
        let (x1, x2) = (a[i], b[i]);
        if (x1 - x2).abs() <= 1e-14 {
            continue;
        }

        let u = rng.gen_f64();
        let beta = if u <= 0.5 {
            (2.0 * u).powf(1.0 / (eta + 1.0))
        } else {
            (1.0 / (2.0 * (1.0 - u))).powf(1.0 / (eta + 1.0))
        };

        child1[i] = bounds.clamp(0.5 * ((1.0 + beta) * x1 + (1.0 - beta) * x2));
        child2[i] = bounds.clamp(0.5 * ((1.0 - beta) * x1 + (1.0 + beta) * x2));
    }

    Ok((child1, child2))
}

fn segment(len: usize, rng: &mut RandomNumberGenerator) -> (usize, usize) {
    let mut p1 = rng.gen_index(len);
    let mut p2 = rng.gen_index(len);
    if p1 > p2 {
        std::mem::swap(&mut p1, &mut p2);
    }
    (p1, p2)
}

fn ensure_permutation_pair(a: &[usize], b: &[usize]) -> Result<()> {
    ensure_same_shape(a.len(), b.len())?;
    let left: HashSet<usize> = a.iter().copied().collect();
    if left.len() != a.len() || b.iter().any(|v| !left.contains(v)) {
        return Err(GeneticError::Breeding(
            "Permutation crossover requires both parents to order the same elements".to_string(),
        ));
    }
    Ok(())
}

/// Order crossover (OX).
///
/// Each child keeps a random segment of one parent in place and fills the
/// remaining positions, starting after the segment and wrapping around, with the
/// missing elements in the order they appear in the other parent.
pub fn order_crossover(
    a: &[usize],
    b: &[usize],
    rng: &mut RandomNumberGenerator,
) -> Result<(Vec<usize>, Vec<usize>)> {
    ensure_permutation_pair(a, b)?;
    let len = a.len();
    if len <= 2 {
        return Ok((a.to_vec(), b.to_vec()));
    }

    let (p1, p2) = segment(len, rng);
    Ok((
        order_child(a, b, p1, p2),
        order_child(b, a, p1, p2),
    ))
}

fn order_child(keep: &[usize], fill: &[usize], p1: usize, p2: usize) -> Vec<usize> {
    let len = keep.len();
    let kept: HashSet<usize> = keep[p1..=p2].iter().copied().collect();
    let mut child = keep.to_vec();

    let mut pos = (p2 + 1) % len;
    for &v in fill.iter().cycle().skip(p2 + 1).take(len) {
        if kept.contains(&v) {
            continue;
        }
        child[pos] = v;
        pos = (pos + 1) % len;
    }
    child
}

/// Partially mapped crossover (PMX).
///
/// Each child takes a random segment from one parent; every other position takes
/// the other parent's element, followed through the segment mapping until it no
/// longer collides with the copied segment.
pub fn partially_mapped(
    a: &[usize],
    b: &[usize],
    rng: &mut RandomNumberGenerator,
) -> Result<(Vec<usize>, Vec<usize>)> {
    ensure_permutation_pair(a, b)?;
    let len = a.len();
    if len <= 2 {
        return Ok((a.to_vec(), b.to_vec()));
    }

    let (p1, p2) = segment(len, rng);
    Ok((pmx_child(a, b, p1, p2), pmx_child(b, a, p1, p2)))
}

fn pmx_child(donor: &[usize], other: &[usize], p1: usize, p2: usize) -> Vec<usize> {
    // value in the donor segment -> value at the same position in `other`
    let mapping: HashMap<usize, usize> = (p1..=p2)
        .filter(|&i| donor[i] != other[i])
        .map(|i| (donor[i], other[i]))
        .collect();

    let mut child = other.to_vec();
    child[p1..=p2].copy_from_slice(&donor[p1..=p2]);

    for i in (0..p1).chain(p2 + 1..donor.len()) {
        let mut v = other[i];
        while let Some(&next) = mapping.get(&v) {
            v = next;
        }
        child[i] = v;
    }
    child
}

/// Edge recombination crossover.
///
/// Builds the union of both parents' adjacency lists and walks it, always moving
/// to the neighbour with the fewest remaining neighbours. Ties and dead ends are
/// resolved with `rng`. The first child starts from `a[0]`, the second from `b[0]`.
pub fn edge_recombination(
    a: &[usize],
    b: &[usize],
    rng: &mut RandomNumberGenerator,
) -> Result<(Vec<usize>, Vec<usize>)> {
    ensure_permutation_pair(a, b)?;
    if a.len() <= 2 {
        return Ok((a.to_vec(), b.to_vec()));
    }

    let edges = adjacency(a, b);
    let child1 = edge_walk(edges.clone(), a[0], rng);
    let child2 = edge_walk(edges, b[0], rng);
    Ok((child1, child2))
}

fn adjacency(a: &[usize], b: &[usize]) -> BTreeMap<usize, BTreeSet<usize>> {
    let n = a.len();
    let mut edges: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for parent in [a, b] {
        for i in 0..n {
            let prev = parent[(i + n - 1) % n];
            let next = parent[(i + 1) % n];
            let entry = edges.entry(parent[i]).or_default();
            entry.insert(prev);
            entry.insert(next);
        }
    }
    edges
}

fn edge_walk(
    mut edges: BTreeMap<usize, BTreeSet<usize>>,
    start: usize,
    rng: &mut RandomNumberGenerator,
) -> Vec<usize> {
    let n = edges.len();
    let mut child = Vec::with_capacity(n);
    let mut current = start;

    loop {
        child.push(current);
        for list in edges.values_mut() {
            list.remove(&current);
        }
        let neighbours = edges.remove(&current).unwrap_or_default();
        if edges.is_empty() {
            break;
        }

        let candidates: Vec<usize> = if neighbours.is_empty() {
            edges.keys().copied().collect()
        } else {
            let fewest = neighbours
                .iter()
                .map(|v| edges.get(v).map_or(0, |l| l.len()))
                .min()
                .unwrap_or(0);
            neighbours
                .iter()
                .copied()
                .filter(|v| edges.get(v).map_or(0, |l| l.len()) == fewest)
                .collect()
        };
        current = candidates[rng.gen_index(candidates.len())];
    }

    child
}
