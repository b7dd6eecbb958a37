//! Banker's Algorithm
//!
//! Deadlock avoidance: decides whether granting a resource request keeps the
//! system in a safe state, i.e. one where every process can still finish in
//! some order.

use serde::{Deserialize, Serialize};

/// Error type for inconsistent Banker's state.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BankersError {
    #[error("Invalid safety request: {0}")]
    InvalidRequest(String),
    #[error("`{field}` has length {found}, expected {expected}")]
    DimensionMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Process {process} allocates more of resource {resource} than it claims")]
    AllocationExceedsClaim { process: usize, resource: usize },
    #[error("Process index {process} out of range ({processes} processes)")]
    ProcessOutOfRange { process: usize, processes: usize },
    #[error("Total units of resource {resource} overflow at process {process}")]
    Overflow { process: usize, resource: usize },
}

/// A resource request against a Banker's state, as sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyRequest {
    pub available: Vec<u64>,
    pub max: Vec<Vec<u64>>,
    pub allocation: Vec<Vec<u64>>,
    pub request: Vec<u64>,
    pub process: usize,
}

/// Outcome of a safety check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum SafetyStatus {
    /// Every process can finish; `sequence` is one order in which they do.
    #[serde(rename = "Safe")]
    Safe { sequence: Vec<usize> },
    /// The request was refused before the safety algorithm ran.
    #[serde(rename = "Denied")]
    Denied { reason: String },
    /// No order lets every process finish; `sequence` holds those that can.
    #[serde(rename = "Deadlock detected")]
    Unsafe { sequence: Vec<usize> },
}

impl SafetyStatus {
    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyStatus::Safe { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            SafetyStatus::Safe { .. } => "Safe",
            SafetyStatus::Denied { .. } => "Denied",
            SafetyStatus::Unsafe { .. } => "Deadlock detected",
        }
    }
}

/// Available, maximum-claim and allocation matrices for `n` processes over
/// `m` resource types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankersState {
    available: Vec<u64>,
    max: Vec<Vec<u64>>,
    allocation: Vec<Vec<u64>>,
}

impl BankersState {
    /// Validates dimensions, that no allocation exceeds its claim and that
    /// `available[j] + sum(allocation[..][j])` fits in a `u64`.
    pub fn new(
        available: Vec<u64>,
        max: Vec<Vec<u64>>,
        allocation: Vec<Vec<u64>>,
    ) -> Result<Self, BankersError> {
        let resources = available.len();
        check_len("allocation", max.len(), allocation.len())?;

        // Upper bound on the work vector during the safety scan.
        let mut totals = available.clone();
        for (process, (claim, held)) in max.iter().zip(&allocation).enumerate() {
            check_len("max", resources, claim.len())?;
            check_len("allocation", resources, held.len())?;
            if let Some(resource) = claim.iter().zip(held).position(|(c, h)| h > c) {
                return Err(BankersError::AllocationExceedsClaim { process, resource });
            }
            for (resource, (total, units)) in totals.iter_mut().zip(held).enumerate() {
                *total = total
                    .checked_add(*units)
                    .ok_or(BankersError::Overflow { process, resource })?;
            }
        }

        Ok(Self {
            available,
            max,
            allocation,
        })
    }

    pub fn processes(&self) -> usize {
        self.max.len()
    }

    pub fn resources(&self) -> usize {
        self.available.len()
    }

    /// Remaining claim of `process`: `max - allocation`.
    pub fn need(&self, process: usize) -> Vec<u64> {
        self.max[process]
            .iter()
            .zip(&self.allocation[process])
            .map(|(claim, held)| claim - held)
            .collect()
    }

    /// Runs the safety algorithm on the current state.
    pub fn check(&self) -> SafetyStatus {
        let processes = self.processes();
        let mut work = self.available.clone();
        let mut finished = vec![false; processes];
        let mut sequence = Vec::with_capacity(processes);

        while sequence.len() < processes {
            let mut progressed = false;

            for process in 0..processes {
                if finished[process] || !fits(&self.need(process), &work) {
                    continue;
                }
                for (slot, held) in work.iter_mut().zip(&self.allocation[process]) {
                    *slot += held;
                }
                finished[process] = true;
                sequence.push(process);
                progressed = true;
            }

            if !progressed {
                return SafetyStatus::Unsafe { sequence };
            }
        }

        SafetyStatus::Safe { sequence }
    }

    /// Checks whether granting `request` to `process` leaves the system
    /// safe. The state itself is not modified.
    pub fn try_request(
        &self,
        process: usize,
        request: &[u64],
    ) -> Result<SafetyStatus, BankersError> {
        if process >= self.processes() {
            return Err(BankersError::ProcessOutOfRange {
                process,
                processes: self.processes(),
            });
        }
        check_len("request", self.resources(), request.len())?;

        if !fits(request, &self.need(process)) {
            return Ok(SafetyStatus::Denied {
                reason: format!("Request exceeds the remaining claim of process {process}"),
            });
        }
        if !fits(request, &self.available) {
            return Ok(SafetyStatus::Denied {
                reason: "Request exceeds available resources".to_string(),
            });
        }

        let mut granted = self.clone();
        for (resource, amount) in request.iter().enumerate() {
            granted.available[resource] -= amount;
            granted.allocation[process][resource] += amount;
        }

        Ok(granted.check())
    }
}

/// Validates a client request and checks its safety.
pub fn check_safety(request: &SafetyRequest) -> Result<SafetyStatus, BankersError> {
    let state = BankersState::new(
        request.available.clone(),
        request.max.clone(),
        request.allocation.clone(),
    )?;
    let status = state.try_request(request.process, &request.request)?;
    crate::metrics::trace_safety_checked(request.process, &status);
    Ok(status)
}

fn fits(demand: &[u64], supply: &[u64]) -> bool {
    demand.iter().zip(supply).all(|(d, s)| d <= s)
}

fn check_len(field: &'static str, expected: usize, found: usize) -> Result<(), BankersError> {
    if expected == found {
        Ok(())
    } else {
        Err(BankersError::DimensionMismatch {
            field,
            expected,
            found,
        })
    }
}
