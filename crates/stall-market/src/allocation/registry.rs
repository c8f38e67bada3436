use std::collections::BTreeMap;

use super::domain::{AllocationError, NewStall, Occupancy, Stall, StallId, StallLookup};

/// Stall rows keyed by id.
#[derive(Debug, Clone, Default)]
pub struct StallTable {
    rows: BTreeMap<StallId, Stall>,
    next_id: u64,
}

impl StallTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Owner of stall occupancy. Writes are unconditional; business validation belongs to callers.
pub struct StallRegistry;

impl StallRegistry {
    /// Administrative registration. Stall numbers are unique.
    pub fn register(table: &mut StallTable, stall: NewStall) -> Result<Stall, AllocationError> {
        let stall_no = stall.stall_no.trim().to_string();
        if stall_no.is_empty() {
            return Err(AllocationError::InvalidArgument(
                "stall number is required".to_string(),
            ));
        }
        if stall.rent_price.is_sign_negative() {
            return Err(AllocationError::InvalidArgument(format!(
                "stall {stall_no} has a negative rent price"
            )));
        }
        // An occupied stall must be backed by an active rental, which only approval opens.
        if stall.occupancy == Occupancy::Occupied {
            return Err(AllocationError::InvalidArgument(format!(
                "stall {stall_no} cannot be registered as occupied"
            )));
        }
        if table.rows.values().any(|row| row.stall_no == stall_no) {
            return Err(AllocationError::InvalidArgument(format!(
                "stall number {stall_no} is already registered"
            )));
        }

        table.next_id += 1;
        let record = Stall {
            id: StallId(table.next_id),
            stall_no,
            name: stall.name,
            type_id: stall.type_id,
            rent_price: stall.rent_price.round_dp(2),
            occupancy: stall.occupancy,
        };
        table.rows.insert(record.id, record.clone());
        Ok(record)
    }

    /// Overwrite the occupancy column, returning the previous value.
    pub fn set_occupancy(
        table: &mut StallTable,
        stall_id: StallId,
        occupancy: Occupancy,
    ) -> Result<Occupancy, AllocationError> {
        let row = table
            .rows
            .get_mut(&stall_id)
            .ok_or_else(|| AllocationError::stall_not_found(stall_id))?;
        Ok(std::mem::replace(&mut row.occupancy, occupancy))
    }

    pub fn occupancy(table: &StallTable, stall_id: StallId) -> Result<Occupancy, AllocationError> {
        Self::lookup(table, stall_id).map(|lookup| lookup.occupancy)
    }

    pub fn lookup(table: &StallTable, stall_id: StallId) -> Result<StallLookup, AllocationError> {
        table
            .rows
            .get(&stall_id)
            .map(|row| StallLookup {
                stall_id,
                rent_price: row.rent_price,
                occupancy: row.occupancy,
            })
            .ok_or_else(|| AllocationError::stall_not_found(stall_id))
    }

    pub fn get(table: &StallTable, stall_id: StallId) -> Result<Stall, AllocationError> {
        table
            .rows
            .get(&stall_id)
            .cloned()
            .ok_or_else(|| AllocationError::stall_not_found(stall_id))
    }

    /// Stalls open for new leases, ordered by stall number.
    pub fn available(table: &StallTable) -> Vec<Stall> {
        let mut stalls: Vec<Stall> = table
            .rows
            .values()
            .filter(|row| row.occupancy == Occupancy::Available)
            .cloned()
            .collect();
        stalls.sort_by(|left, right| left.stall_no.cmp(&right.stall_no));
        stalls
    }
}
