//! Input rows for the command-line driver.
use serde::Deserialize;

use crate::bank::{AccountId, Money};

/// Enum representing the kind of command.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Create,
    Transfer,
}

/// One row of the input CSV.
///
/// For `create`, `account` is the new id and `amount` the opening balance. For `transfer`,
/// money moves from `account` to `counterparty`.
#[derive(Deserialize, Debug, Clone)]
pub struct Command {
    #[serde(rename = "type")]
    command_type: CommandType,

    account: AccountId,

    #[serde(default)]
    counterparty: Option<AccountId>,

    #[serde(with = "rust_decimal::serde::str")]
    amount: Money,
}

impl Command {
    /// Gets the type of the command.
    pub fn get_type(&self) -> CommandType {
        self.command_type
    }

    /// Gets the primary account: the new account for `create`, the source for `transfer`.
    pub fn get_account(&self) -> &str {
        &self.account
    }

    /// Gets the destination account of a transfer.
    pub fn get_counterparty(&self) -> Option<&str> {
        self.counterparty.as_deref().filter(|id| !id.is_empty())
    }

    /// Gets the amount: opening balance or transfer amount.
    pub fn get_amount(&self) -> Money {
        self.amount
    }
}

#[cfg(test)]
mod tests {
    use csv::{ReaderBuilder, Trim};
    use rust_decimal::Decimal;

    use super::{Command, CommandType};

    fn parse(input: &str) -> Vec<Command> {
        ReaderBuilder::new()
            .trim(Trim::All)
            .from_reader(input.as_bytes())
            .deserialize()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_parse_commands() {
        let commands = parse(
            "type, account, counterparty, amount\n\
             create, 1, , 100.25\n\
             transfer, 1, 2, 50\n",
        );
        assert_eq!(commands.len(), 2);

        assert_eq!(commands[0].get_type(), CommandType::Create);
        assert_eq!(commands[0].get_account(), "1");
        assert_eq!(commands[0].get_counterparty(), None);
        assert_eq!(commands[0].get_amount(), Decimal::new(10025, 2));

        assert_eq!(commands[1].get_type(), CommandType::Transfer);
        assert_eq!(commands[1].get_counterparty(), Some("2"));
        assert_eq!(commands[1].get_amount(), Decimal::from(50));
    }

    #[test]
    fn test_reject_unknown_type() {
        let result = ReaderBuilder::new()
            .from_reader("type,account,counterparty,amount\nwithdraw,1,,5\n".as_bytes())
            .deserialize::<Command>()
            .next()
            .unwrap();
        assert!(result.is_err());
    }
}
