use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IrError;
use crate::transpiler::sql::h2::H2Generator;
use crate::transpiler::sql::mysql::MysqlGenerator;
use crate::transpiler::sql::postgres::PostgresGenerator;
use crate::transpiler::sql::sqlite::SqliteGenerator;
use crate::transpiler::sql::sqlserver::SqlServerGenerator;
use crate::transpiler::traits::SqlGenerator;

/// Supported SQL Dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    MySQL,
    SqlServer,
    SQLite,
    H2,
}

impl Dialect {
    pub const ALL: [Dialect; 5] = [
        Dialect::Postgres,
        Dialect::MySQL,
        Dialect::SqlServer,
        Dialect::SQLite,
        Dialect::H2,
    ];

    pub fn generator(&self) -> Box<dyn SqlGenerator> {
        match self {
            Dialect::Postgres => Box::new(PostgresGenerator),
            Dialect::MySQL => Box::new(MysqlGenerator),
            Dialect::SqlServer => Box::new(SqlServerGenerator),
            Dialect::SQLite => Box::new(SqliteGenerator),
            Dialect::H2 => Box::new(H2Generator),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::Postgres => "Postgres",
            Dialect::MySQL => "MySQL",
            Dialect::SqlServer => "SQL Server",
            Dialect::SQLite => "SQLite",
            Dialect::H2 => "H2",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Dialect {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace([' ', '-', '_'], "").as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySQL),
            "sqlserver" | "mssql" => Ok(Dialect::SqlServer),
            "sqlite" => Ok(Dialect::SQLite),
            "h2" => Ok(Dialect::H2),
            other => Err(IrError::Config(format!("unknown dialect '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.to_string().parse::<Dialect>().unwrap(), dialect);
            assert_eq!(dialect.generator().dialect(), dialect);
        }
        assert_eq!("mssql".parse::<Dialect>().unwrap(), Dialect::SqlServer);
        assert!("oracle".parse::<Dialect>().is_err());
    }
}
