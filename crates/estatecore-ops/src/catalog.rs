use serde::Serialize;
use std::fmt;

/// Columns the store fills in when the CSV cell is blank.
pub const STORE_DEFAULTED_COLUMNS: &[&str] = &["id", "created_at"];

/// Every entity the bulk loader knows how to ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Tenant,
    Lease,
    Payment,
    Expense,
    UtilityBill,
    Message,
    Application,
}

/// Fixed contract binding an entity to its table, source file and column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySpec {
    pub entity: Entity,
    pub table: &'static str,
    pub file_name: &'static str,
    pub columns: &'static [&'static str],
}

impl Entity {
    /// Load order: parents precede the rows that reference them.
    pub const ALL: [Entity; 7] = [
        Entity::Tenant,
        Entity::Lease,
        Entity::Payment,
        Entity::Expense,
        Entity::UtilityBill,
        Entity::Message,
        Entity::Application,
    ];

    pub fn spec(self) -> &'static EntitySpec {
        match self {
            Entity::Tenant => &TENANT,
            Entity::Lease => &LEASE,
            Entity::Payment => &PAYMENT,
            Entity::Expense => &EXPENSE,
            Entity::UtilityBill => &UTILITY_BILL,
            Entity::Message => &MESSAGE,
            Entity::Application => &APPLICATION,
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|entity| entity.spec().file_name == name)
    }

    pub fn label(self) -> &'static str {
        match self {
            Entity::Tenant => "Tenant",
            Entity::Lease => "Lease",
            Entity::Payment => "Payment",
            Entity::Expense => "Expense",
            Entity::UtilityBill => "Utility bill",
            Entity::Message => "Message",
            Entity::Application => "Application",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().table)
    }
}

impl EntitySpec {
    pub fn is_store_defaulted(&self, column: &str) -> bool {
        STORE_DEFAULTED_COLUMNS.contains(&column) && self.columns.contains(&column)
    }

    pub fn column_list(&self) -> String {
        self.columns.join(", ")
    }
}

const TENANT: EntitySpec = EntitySpec {
    entity: Entity::Tenant,
    table: "tenant",
    file_name: "tenants_psql.csv",
    columns: &["id", "name", "email", "client_id", "created_at"],
};

const LEASE: EntitySpec = EntitySpec {
    entity: Entity::Lease,
    table: "lease",
    file_name: "leases_psql.csv",
    columns: &[
        "id",
        "tenant_id",
        "contract_rent",
        "start_date",
        "end_date",
        "created_at",
    ],
};

const PAYMENT: EntitySpec = EntitySpec {
    entity: Entity::Payment,
    table: "payment",
    file_name: "payments_psql.csv",
    columns: &[
        "id",
        "tenant_id",
        "month",
        "amount_due",
        "amount_paid",
        "days_late",
        "paid",
        "created_at",
    ],
};

const EXPENSE: EntitySpec = EntitySpec {
    entity: Entity::Expense,
    table: "expense",
    file_name: "expenses_psql.csv",
    columns: &["id", "client_id", "category", "amount", "date", "created_at"],
};

const UTILITY_BILL: EntitySpec = EntitySpec {
    entity: Entity::UtilityBill,
    table: "utility_bill",
    file_name: "utility_bills_psql.csv",
    columns: &[
        "id",
        "client_id",
        "month",
        "amount",
        "heating_type",
        "created_at",
    ],
};

const MESSAGE: EntitySpec = EntitySpec {
    entity: Entity::Message,
    table: "message",
    file_name: "messages_psql.csv",
    columns: &["id", "client_id", "tenant_id", "text", "created_at"],
};

const APPLICATION: EntitySpec = EntitySpec {
    entity: Entity::Application,
    table: "application",
    file_name: "applications_psql.csv",
    columns: &[
        "id",
        "tenant_name",
        "income",
        "proposed_rent",
        "credit_score",
        "late_payments",
        "client_id",
        "created_at",
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tables_and_file_names_are_unique() {
        let tables: HashSet<_> = Entity::ALL.iter().map(|e| e.spec().table).collect();
        let files: HashSet<_> = Entity::ALL.iter().map(|e| e.spec().file_name).collect();
        assert_eq!(tables.len(), Entity::ALL.len());
        assert_eq!(files.len(), Entity::ALL.len());
    }

    #[test]
    fn every_contract_carries_identity_and_timestamp() {
        for entity in Entity::ALL {
            let spec = entity.spec();
            assert_eq!(spec.entity, entity);
            assert_eq!(spec.columns.first(), Some(&"id"), "{entity}");
            assert_eq!(spec.columns.last(), Some(&"created_at"), "{entity}");
        }
    }

    #[test]
    fn file_lookup_is_exact() {
        assert_eq!(
            Entity::from_file_name("payments_psql.csv"),
            Some(Entity::Payment)
        );
        assert_eq!(Entity::from_file_name("payments.csv"), None);
        assert_eq!(Entity::from_file_name("old_payments_psql.csv"), None);
        assert_eq!(Entity::from_file_name("PAYMENTS_PSQL.CSV"), None);
    }

    #[test]
    fn tenant_loads_before_its_dependents() {
        let position = |target: Entity| Entity::ALL.iter().position(|e| *e == target);
        let tenant = position(Entity::Tenant);
        for child in [Entity::Lease, Entity::Payment, Entity::Message] {
            assert!(tenant < position(child), "{child} must follow tenant");
        }
    }

    #[test]
    fn store_defaulted_columns_are_identity_and_timestamp() {
        let spec = Entity::Lease.spec();
        assert!(spec.is_store_defaulted("id"));
        assert!(spec.is_store_defaulted("created_at"));
        assert!(!spec.is_store_defaulted("tenant_id"));
    }
}
