use std::fmt;
use std::str::FromStr;

/// Host execution strategy for the statistics and transform passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Sequential two-pass reference, one group at a time.
    Scalar,
    /// Group-parallel batched-dot reductions on the rayon pool.
    Parallel,
    /// `Parallel` reductions plus an AVX2 normalize/affine row kernel.
    Avx2,
}

impl Backend {
    /// Pick the fastest backend the running CPU supports.
    pub fn detect() -> Self {
        let backend = if avx2_available() {
            Self::Avx2
        } else {
            Self::Parallel
        };
        tracing::debug!(?backend, "detected host backend");
        backend
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Parallel => "parallel",
            Self::Avx2 => "avx2",
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self::detect()
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scalar" => Ok(Self::Scalar),
            "parallel" => Ok(Self::Parallel),
            "avx2" => Ok(Self::Avx2),
            "auto" => Ok(Self::detect()),
            other => Err(format!(
                "unknown backend '{other}', expected 'scalar', 'parallel', 'avx2', or 'auto'"
            )),
        }
    }
}

/// Whether the AVX2 row kernel can run on this CPU.
pub fn avx2_available() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        is_x86_feature_detected!("avx2")
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}
