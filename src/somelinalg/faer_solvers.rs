//! Thin wrappers over faer sparse LU and faer_gmres used by the coarsest-level solvers.
use faer::mat::Mat;
use faer::prelude::*;
use faer::sparse::{SparseColMat, Triplet};
use faer_gmres::gmres;

pub type FaerMat = SparseColMat<usize, f64>;

/// Square sparse matrix from `(row, col, value)` triplets. Duplicates are summed.
pub fn sparse_from_triplets(n: usize, triplets: &[(usize, usize, f64)]) -> Result<FaerMat, String> {
    let faer_triplets: Vec<Triplet<usize, usize, f64>> = triplets
        .iter()
        .map(|&(i, j, v)| Triplet::new(i, j, v))
        .collect();
    SparseColMat::<usize, f64>::try_new_from_triplets(n, n, &faer_triplets)
        .map_err(|e| format!("failed to assemble sparse matrix: {:?}", e))
}

/// A sparse LU factorization kept between solves.
pub struct SparseLu {
    n: usize,
    lu: faer::sparse::linalg::solvers::Lu<usize, f64>,
}

impl SparseLu {
    pub fn factorize(mat: &FaerMat) -> Result<Self, String> {
        let (n, m) = mat.shape();
        if n != m {
            return Err(format!("matrix must be square, got {}x{}", n, m));
        }
        let lu = mat
            .sp_lu()
            .map_err(|e| format!("sparse LU factorization failed: {:?}", e))?;
        Ok(Self { n, lu })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let mut rhs: Mat<f64> = Mat::<f64>::zeros(self.n, 1);
        for (i, v) in b.iter().enumerate() {
            rhs[(i, 0)] = *v;
        }
        let res: Mat<f64> = self.lu.solve(rhs);
        (0..self.n).map(|i| res[(i, 0)]).collect()
    }
}

/// Unpreconditioned GMRES from a zero initial guess. Returns the solution, the final
/// residual estimate reported by faer_gmres and the iteration count.
pub fn gmres_solve(
    mat: &FaerMat,
    b: &[f64],
    max_iter: usize,
    tol: f64,
) -> Result<(Vec<f64>, f64, usize), String> {
    let n = mat.nrows();
    if b.len() != n {
        return Err(format!("rhs length {} does not match matrix size {}", b.len(), n));
    }
    let mut rhs: Mat<f64> = Mat::<f64>::zeros(n, 1);
    for (i, v) in b.iter().enumerate() {
        rhs[(i, 0)] = *v;
    }
    let mut x: Mat<f64> = Mat::<f64>::zeros(n, 1);
    let (err, iters) = gmres(mat.as_ref(), rhs.as_ref(), x.as_mut(), max_iter, tol, None)
        .map_err(|e| format!("GMRES failed: {:?}", e))?;
    let solution = (0..n).map(|i| x[(i, 0)]).collect();
    Ok((solution, err, iters))
}
