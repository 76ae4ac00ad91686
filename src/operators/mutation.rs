//! Mutation operators.
//!
//! `rate` is always the per-gene (or, for inversion, per-genome) probability of a
//! perturbation. Callers validate it with [`crate::chromosome::validate_rate`]
//! before reaching these functions; a rate of `0.0` never touches the genome.

use rand_distr::{Distribution, Normal};

use super::Bounds;
use crate::chromosome::ensure_same_shape;
use crate::error::{GeneticError, Result};
use crate::rng::RandomNumberGenerator;

/// Flips every bit independently with probability `rate`. Returns the number of flips.
pub fn bit_flip(bits: &mut [bool], rate: f64, rng: &mut RandomNumberGenerator) -> usize {
    if rate <= 0.0 {
        return 0;
    }
    let mut flipped = 0;
    for bit in bits.iter_mut() {
        if rng.gen_bool(rate) {
            *bit = !*bit;
            flipped += 1;
        }
    }
    flipped
}

/// Adds `N(0, sigma * bounds.width())` noise to each gene with probability `rate`,
/// clamping the result into `bounds`.
pub fn gaussian(
    genes: &mut [f64],
    rate: f64,
    sigma: f64,
    bounds: Bounds,
    rng: &mut RandomNumberGenerator,
) -> Result<()> {
    if rate <= 0.0 {
        return Ok(());
    }
    let scale = (sigma * bounds.width()).abs();
    let normal = Normal::new(0.0, scale).map_err(|e| {
        GeneticError::Configuration(format!("Invalid Gaussian mutation scale {}: {}", scale, e))
    })?;

    for gene in genes.iter_mut() {
        if rng.gen_bool(rate) {
            *gene = bounds.clamp(*gene + normal.sample(rng));
        }
    }
    Ok(())
}

/// Polynomial mutation (Deb). `eta` is the distribution index: larger values
/// produce smaller perturbations.
pub fn polynomial(
    genes: &mut [f64],
    rate: f64,
    eta: f64,
    bounds: Bounds,
    rng: &mut RandomNumberGenerator,
) {
    let range = bounds.width();
    if rate <= 0.0 || range <= 0.0 {
        return;
    }

    for gene in genes.iter_mut() {
        if !rng.gen_bool(rate) {
            continue;
        }
        let delta1 = (*gene - bounds.min) / range;
        let delta2 = (bounds.max - *gene) / range;
        let u = rng.gen_f64();

        let delta_q = if u <= 0.5 {
            let val = 2.0 * u + (1.0 - 2.0 * u) * (1.0 - delta1).powf(eta + 1.0);
            val.powf(1.0 / (eta + 1.0)) - 1.0
        } else {
            let val = 2.0 * (1.0 - u) + 2.0 * (u - 0.5) * (1.0 - delta2).powf(eta + 1.0);
            1.0 - val.powf(1.0 / (eta + 1.0))
        };

        *gene = bounds.clamp(*gene + delta_q * range);
    }
}

/// Differential-evolution mutant `base + weight * (donor_a - donor_b)`, clamped into `bounds`.
pub fn differential(
    base: &[f64],
    donor_a: &[f64],
    donor_b: &[f64],
    weight: f64,
    bounds: Bounds,
) -> Result<Vec<f64>> {
    ensure_same_shape(base.len(), donor_a.len())?;
    ensure_same_shape(base.len(), donor_b.len())?;
    Ok(base
        .iter()
        .zip(donor_a.iter().zip(donor_b))
        .map(|(x, (a, b))| bounds.clamp(x + weight * (a - b)))
        .collect())
}

/// Swaps each position with a random other position with probability `rate`.
pub fn swap<T>(genes: &mut [T], rate: f64, rng: &mut RandomNumberGenerator) {
    if rate <= 0.0 || genes.len() < 2 {
        return;
    }
    for i in 0..genes.len() {
        if rng.gen_bool(rate) {
            let j = rng.gen_index(genes.len());
            genes.swap(i, j);
        }
    }
}

/// Reverses one random segment with probability `rate`.
pub fn inversion<T>(genes: &mut [T], rate: f64, rng: &mut RandomNumberGenerator) {
    if rate <= 0.0 || genes.len() < 2 || !rng.gen_bool(rate) {
        return;
    }
    let mut start = rng.gen_index(genes.len());
    let mut end = rng.gen_index(genes.len());
    if start > end {
        std::mem::swap(&mut start, &mut end);
    }
    genes[start..=end].reverse();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_flip_zero_rate_is_noop() {
        let mut rng = RandomNumberGenerator::from_seed(1);
        let mut bits = vec![true, false, true, false];
        assert_eq!(bit_flip(&mut bits, 0.0, &mut rng), 0);
        assert_eq!(bits, vec![true, false, true, false]);
    }

    #[test]
    fn test_bit_flip_full_rate_inverts() {
        let mut rng = RandomNumberGenerator::from_seed(1);
        let mut bits = vec![true, false, true];
        assert_eq!(bit_flip(&mut bits, 1.0, &mut rng), 3);
        assert_eq!(bits, vec![false, true, false]);
    }

    #[test]
    fn test_gaussian_respects_bounds() {
        let mut rng = RandomNumberGenerator::from_seed(4);
        let bounds = Bounds::new(0.0, 1.0);
        let mut genes = vec![0.0, 0.5, 1.0, 0.99];
        for _ in 0..200 {
            gaussian(&mut genes, 1.0, 0.5, bounds, &mut rng).unwrap();
            assert!(genes.iter().all(|&g| bounds.contains(g)));
        }
    }

    #[test]
    fn test_polynomial_respects_bounds() {
        let mut rng = RandomNumberGenerator::from_seed(4);
        let bounds = Bounds::new(-5.0, 5.0);
        let mut genes = vec![-5.0, 0.0, 4.9];
        for _ in 0..200 {
            polynomial(&mut genes, 1.0, 20.0, bounds, &mut rng);
            assert!(genes.iter().all(|&g| bounds.contains(g)));
        }
    }

    #[test]
    fn test_differential_mutant() {
        let mutant = differential(
            &[1.0, 1.0],
            &[3.0, 0.0],
            &[1.0, 0.0],
            0.5,
            Bounds::new(-10.0, 10.0),
        )
        .unwrap();
        assert_eq!(mutant, vec![2.0, 1.0]);

        let clamped =
            differential(&[9.0], &[10.0], &[0.0], 1.0, Bounds::new(-10.0, 10.0)).unwrap();
        assert_eq!(clamped, vec![10.0]);
        assert!(differential(&[1.0], &[1.0, 2.0], &[1.0], 0.5, Bounds::new(0.0, 1.0)).is_err());
    }

    #[test]
    fn test_swap_and_inversion_keep_elements() {
        let mut rng = RandomNumberGenerator::from_seed(8);
        let mut perm: Vec<usize> = (0..10).collect();
        for _ in 0..20 {
            swap(&mut perm, 0.3, &mut rng);
            inversion(&mut perm, 1.0, &mut rng);
        }
        let mut sorted = perm.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
    }
}
