//! Native CPU implementations of the entry points in `kernels.wgsl`.
//!
//! Each function mirrors its WGSL counterpart argument for argument so the
//! CPU backend produces the same results as a GPU, bit for bit where the
//! arithmetic allows it.

use rayon::prelude::*;

use gridkernel_core::error::{GridKernelError, Result};
use gridkernel_cpu::{Invocation, KernelRegistry};

use crate::{COUNT_PRIMES, ESTIMATE_PI, JACOBI_STEP, RESIDUAL_ROWS};

/// Registry with every workload kernel.
pub fn registry() -> KernelRegistry {
    KernelRegistry::new()
        .register(COUNT_PRIMES, count_primes)
        .register(ESTIMATE_PI, estimate_pi)
        .register(JACOBI_STEP, jacobi_step)
        .register(RESIDUAL_ROWS, residual_rows)
}

/// Trial-division primality test.
pub fn is_prime(n: u32) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let mut d = 3u32;
    while d <= n / d {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// PCG-based integer hash, identical to `pcg_hash` in WGSL.
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

fn unit_float(h: u32) -> f32 {
    (h >> 8) as f32 * (1.0 / 16_777_216.0)
}

/// Points inside the unit quarter circle for one work item.
pub fn pi_hits(item: u32, samples: u32, seed: u32) -> u32 {
    let base = pcg_hash(item ^ pcg_hash(seed));
    (0..samples)
        .filter(|&k| {
            let x = unit_float(pcg_hash(base.wrapping_add(k.wrapping_mul(2))));
            let y = unit_float(pcg_hash(base.wrapping_add(k.wrapping_mul(2)).wrapping_add(1)));
            x * x + y * y <= 1.0
        })
        .count() as u32
}

fn require(inv: &Invocation<'_>, what: &str, len: usize, needed: usize) -> Result<()> {
    if len < needed {
        return Err(GridKernelError::LaunchFailed(format!(
            "'{}': {} holds {} elements, {} required",
            inv.entry(),
            what,
            len,
            needed
        )));
    }
    Ok(())
}

/// `count_primes(count, per_item; sequence, total)`.
fn count_primes(inv: &Invocation<'_>) -> Result<()> {
    let count = inv.u32(0)? as usize;
    let per_item = inv.u32(1)? as usize;
    let sequence = inv.read::<u32>(0)?;
    let mut total = inv.write::<u32>(1)?;
    require(inv, "total", total.len(), 1)?;

    let limit = count.min(sequence.len());
    let found: u32 = (0..inv.global().volume() as usize)
        .into_par_iter()
        .map(|item| {
            let start = (item * per_item).min(limit);
            let end = (start + per_item).min(limit);
            sequence[start..end]
                .iter()
                .filter(|&&n| is_prime(n))
                .count() as u32
        })
        .sum();

    total[0] = total[0].wrapping_add(found);
    Ok(())
}

/// `estimate_pi(samples, seed; hits)`.
fn estimate_pi(inv: &Invocation<'_>) -> Result<()> {
    let samples = inv.u32(0)?;
    let seed = inv.u32(1)?;
    let mut hits = inv.write::<u32>(0)?;
    let items = (inv.global().volume() as usize).min(hits.len());

    hits[..items]
        .par_iter_mut()
        .enumerate()
        .for_each(|(item, slot)| *slot = pi_hits(item as u32, samples, seed));
    Ok(())
}

/// `jacobi_step(m, n; psi, psi_new)`.
fn jacobi_step(inv: &Invocation<'_>) -> Result<()> {
    let m = inv.u32(0)? as usize;
    let n = inv.u32(1)? as usize;
    let psi = inv.read::<f32>(0)?;
    let mut psi_new = inv.write::<f32>(1)?;
    let stride = n + 2;
    let cells = (m + 2) * stride;
    require(inv, "psi", psi.len(), cells)?;
    require(inv, "psi_new", psi_new.len(), cells)?;

    // Interior rows only; the halo ring is never written.
    psi_new[stride..(m + 1) * stride]
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(row_offset, row)| {
            let row_start = (row_offset + 1) * stride;
            for j in 1..=n {
                let idx = row_start + j;
                row[j] =
                    0.25 * (psi[idx - 1] + psi[idx + 1] + psi[idx - stride] + psi[idx + stride]);
            }
        });
    Ok(())
}

/// `residual_rows(m, n; psi, psi_new, row_sums)`.
fn residual_rows(inv: &Invocation<'_>) -> Result<()> {
    let m = inv.u32(0)? as usize;
    let n = inv.u32(1)? as usize;
    let psi = inv.read::<f32>(0)?;
    let psi_new = inv.read::<f32>(1)?;
    let mut row_sums = inv.write::<f32>(2)?;
    let stride = n + 2;
    let cells = (m + 2) * stride;
    require(inv, "psi", psi.len(), cells)?;
    require(inv, "psi_new", psi_new.len(), cells)?;
    require(inv, "row_sums", row_sums.len(), m)?;

    row_sums[..m]
        .par_iter_mut()
        .enumerate()
        .for_each(|(row, slot)| {
            let base = (row + 1) * stride;
            let mut acc = 0.0f32;
            for j in 1..=n {
                let d = psi_new[base + j] - psi[base + j];
                acc += d * d;
            }
            *slot = acc;
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_prime_small() {
        let primes: Vec<u32> = (0..30).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert!(!is_prime(7919 * 7907));
        assert!(is_prime(65_521));
    }

    #[test]
    fn test_pcg_hash_known_values() {
        // Must match `pcg_hash` in kernels.wgsl.
        assert_eq!(pcg_hash(0), 129_708_002);
        assert_eq!(pcg_hash(1), 2_831_084_092);
        assert_eq!(pcg_hash(12345), 4_099_845_390);
    }

    #[test]
    fn test_is_prime_near_u32_max() {
        assert!(is_prime(4_294_967_291));
        assert!(is_prime(4_294_967_279));
        assert!(!is_prime(4_294_967_295));
        assert!(!is_prime(65_521 * 65_537));
    }

    #[test]
    fn test_pi_hits_bounded() {
        let hits = pi_hits(3, 1000, 42);
        assert!(hits <= 1000);
        assert!(hits > 700 && hits < 860);
    }
}
