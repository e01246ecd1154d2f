//! Expense and income book used to work out a break-even price.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpenseRecord {
    pub amount: Decimal,
    pub category: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncomeRecord {
    pub amount: Decimal,
    pub source: String,
    pub date: String,
}

/// Records are only ever appended; nothing is persisted.
#[derive(Debug, Default, Clone)]
pub struct ExpenseLedger {
    expenses: Vec<ExpenseRecord>,
    incomes: Vec<IncomeRecord>,
}

fn parse_positive(amount: &str) -> Option<Decimal> {
    Decimal::from_str(amount.trim())
        .ok()
        .filter(|value| value.is_sign_positive() && !value.is_zero())
}

fn filled(field: &str) -> Option<String> {
    let field = field.trim();
    (!field.is_empty()).then(|| field.to_string())
}

impl ExpenseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an expense. Returns `false` and records nothing when the
    /// amount is not a positive number or a text field is blank.
    pub fn add_expense(&mut self, amount: &str, category: &str, date: &str) -> bool {
        match (parse_positive(amount), filled(category), filled(date)) {
            (Some(amount), Some(category), Some(date)) => {
                self.expenses.push(ExpenseRecord {
                    amount,
                    category,
                    date,
                });
                true
            }
            _ => false,
        }
    }

    pub fn add_income(&mut self, amount: &str, source: &str, date: &str) -> bool {
        match (parse_positive(amount), filled(source), filled(date)) {
            (Some(amount), Some(source), Some(date)) => {
                self.incomes.push(IncomeRecord {
                    amount,
                    source,
                    date,
                });
                true
            }
            _ => false,
        }
    }

    pub fn expenses(&self) -> &[ExpenseRecord] {
        &self.expenses
    }

    pub fn incomes(&self) -> &[IncomeRecord] {
        &self.incomes
    }

    pub fn total_expense(&self) -> Decimal {
        self.expenses.iter().map(|record| record.amount).sum()
    }

    pub fn total_income(&self) -> Decimal {
        self.incomes.iter().map(|record| record.amount).sum()
    }

    pub fn profit_loss(&self) -> Decimal {
        self.total_income() - self.total_expense()
    }

    /// Total expense divided by the expected production in kilograms,
    /// rounded to cents. `None` unless production is a number above zero.
    pub fn minimum_price_per_kg(&self, production: &str) -> Option<Decimal> {
        let production = parse_positive(production)?;
        let mut price = self
            .total_expense()
            .checked_div(production)?
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        price.rescale(2);
        Some(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_price_divides_total_by_production() {
        let mut ledger = ExpenseLedger::new();
        assert!(ledger.add_expense("10.0", "Seeds", "2024-03-01"));
        assert!(ledger.add_expense("20.0", "Labour", "2024-03-02"));
        assert_eq!(ledger.total_expense(), Decimal::new(30, 0));
        assert_eq!(ledger.minimum_price_per_kg("5"), Some(Decimal::new(600, 2)));
        assert_eq!(ledger.minimum_price_per_kg("5").unwrap().to_string(), "6.00");
    }

    #[test]
    fn minimum_price_rounds_to_two_places() {
        let mut ledger = ExpenseLedger::new();
        ledger.add_expense("10", "Seeds", "2024-03-01");
        assert_eq!(ledger.minimum_price_per_kg("3"), Some(Decimal::new(333, 2)));
        assert_eq!(ledger.minimum_price_per_kg("6"), Some(Decimal::new(167, 2)));
    }

    #[test]
    fn minimum_price_needs_positive_production() {
        let mut ledger = ExpenseLedger::new();
        ledger.add_expense("10", "Seeds", "2024-03-01");
        for production in ["", "0", "-4", "lots"] {
            assert_eq!(ledger.minimum_price_per_kg(production), None, "{production:?}");
        }
    }

    #[test]
    fn invalid_expenses_are_skipped() {
        let mut ledger = ExpenseLedger::new();
        assert!(!ledger.add_expense("abc", "Seeds", "2024-03-01"));
        assert!(!ledger.add_expense("0", "Seeds", "2024-03-01"));
        assert!(!ledger.add_expense("-5", "Seeds", "2024-03-01"));
        assert!(!ledger.add_expense("5", "  ", "2024-03-01"));
        assert!(!ledger.add_expense("5", "Seeds", ""));
        assert!(ledger.expenses().is_empty());
        assert_eq!(ledger.total_expense(), Decimal::ZERO);
    }

    #[test]
    fn empty_ledger_prices_at_zero() {
        let ledger = ExpenseLedger::new();
        assert_eq!(ledger.minimum_price_per_kg("10"), Some(Decimal::ZERO));
    }

    #[test]
    fn profit_loss_nets_income_against_expense() {
        let mut ledger = ExpenseLedger::new();
        ledger.add_expense("120.50", "Fertilizer", "2024-04-01");
        ledger.add_income("100", "Maize sale", "2024-05-01");
        assert_eq!(ledger.total_income(), Decimal::new(100, 0));
        assert_eq!(ledger.profit_loss(), Decimal::new(-2050, 2));
        assert_eq!(ledger.incomes()[0].source, "Maize sale");
    }
}
