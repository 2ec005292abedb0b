//! Synthetic fixture tables.
//!
//! Each known table has a small hard-coded row set that is registered in
//! place of the real parquet file when that file cannot be fetched or does
//! not validate, so every query in the studio still has something to run
//! against offline.

use duckdb::types::Value;

/// Column type of a fixture column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Double,
    Varchar,
    Date,
}

impl ColumnType {
    /// DuckDB type name.
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Double => "DOUBLE",
            ColumnType::Varchar => "VARCHAR",
            ColumnType::Date => "DATE",
        }
    }
}

/// One column of a fixture table.
#[derive(Debug, Clone, Copy)]
pub struct FixtureColumn {
    pub name: &'static str,
    pub ty: ColumnType,
}

/// One cell of a fixture row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixtureValue {
    Int(i32),
    Float(f64),
    Text(&'static str),
    /// ISO-8601 calendar date (`YYYY-MM-DD`).
    Date(&'static str),
}

impl FixtureValue {
    /// Convert into a bindable DuckDB value.
    ///
    /// Dates bind as text and are cast by the insert statement.
    pub fn to_sql_value(&self) -> Value {
        match self {
            FixtureValue::Int(i) => Value::Int(*i),
            FixtureValue::Float(f) => Value::Double(*f),
            FixtureValue::Text(s) | FixtureValue::Date(s) => Value::Text((*s).to_string()),
        }
    }
}

/// A typed, hard-coded table.
#[derive(Debug)]
pub struct FixtureTable {
    pub name: &'static str,
    pub columns: &'static [FixtureColumn],
    pub rows: &'static [&'static [FixtureValue]],
}

impl FixtureTable {
    /// `CREATE TABLE` statement for this fixture.
    pub fn create_sql(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("\"{}\" {}", c.name, c.ty.sql_name()))
            .collect();
        format!("CREATE TABLE {} ({})", self.name, columns.join(", "))
    }

    /// Parameterised `INSERT` statement, one placeholder per column.
    pub fn insert_sql(&self) -> String {
        let placeholders: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("CAST(? AS {})", c.ty.sql_name()))
            .collect();
        format!("INSERT INTO {} VALUES ({})", self.name, placeholders.join(", "))
    }
}

/// Look up the fixture for a table.
pub fn fixture_for(table: &str) -> Option<&'static FixtureTable> {
    FIXTURES.iter().find(|f| f.name == table)
}

const fn col(name: &'static str, ty: ColumnType) -> FixtureColumn {
    FixtureColumn { name, ty }
}

use ColumnType::{Date as DATE, Double as DOUBLE, Integer as INTEGER, Varchar as VARCHAR};
use FixtureValue::{Date as D, Float as F, Int as I, Text as T};

/// All fixture tables, one per known table.
pub static FIXTURES: &[FixtureTable] = &[
    FixtureTable {
        name: "households",
        columns: &[col("household_id", INTEGER), col("income", VARCHAR)],
        rows: &[
            &[I(1001), T("35-49K")],
            &[I(1002), T("50-74K")],
            &[I(1003), T("75-99K")],
            &[I(1004), T("25-34K")],
            &[I(1005), T("100-124K")],
            &[I(1006), T("150K+")],
            &[I(1007), T("Under 25K")],
            &[I(1008), T("75-99K")],
        ],
    },
    FixtureTable {
        name: "products",
        columns: &[
            col("product_id", INTEGER),
            col("department", VARCHAR),
            col("product_category", VARCHAR),
        ],
        rows: &[
            &[I(2001), T("GROCERY"), T("Snacks")],
            &[I(2002), T("GROCERY"), T("Beverages")],
            &[I(2003), T("DAIRY"), T("Yogurt")],
            &[I(2004), T("PRODUCE"), T("Fresh Fruit")],
            &[I(2005), T("MEAT"), T("Poultry")],
            &[I(2006), T("HOUSEHOLD"), T("Cleaning")],
            &[I(2007), T("FROZEN"), T("Frozen Meals")],
            &[I(2008), T("BAKERY"), T("Bread")],
            &[I(2009), T("DELI"), T("Ready Meals")],
            &[I(2010), T("PERSONAL CARE"), T("Shampoo")],
        ],
    },
    FixtureTable {
        name: "transactions",
        columns: &[
            col("basket_id", INTEGER),
            col("household_id", INTEGER),
            col("product_id", INTEGER),
            col("sales_value", DOUBLE),
            col("coupon_disc", DOUBLE),
            col("coupon_match_disc", DOUBLE),
            col("week", INTEGER),
            col("day", INTEGER),
            col("transaction_date", DATE),
        ],
        rows: &[
            &[I(1), I(1001), I(2001), F(12.5), F(-0.5), F(-0.2), I(1), I(1), D("2020-01-05")],
            &[I(2), I(1001), I(2002), F(8.2), F(0.0), F(0.0), I(2), I(8), D("2020-01-12")],
            &[I(3), I(1001), I(2001), F(15.1), F(-1.0), F(-0.5), I(6), I(39), D("2020-02-09")],
            &[I(3), I(1001), I(2003), F(5.4), F(0.0), F(0.0), I(6), I(39), D("2020-02-09")],
            &[I(4), I(1002), I(2002), F(9.0), F(0.0), F(0.0), I(1), I(3), D("2020-01-07")],
            &[I(5), I(1002), I(2002), F(14.0), F(-0.8), F(-0.3), I(7), I(45), D("2020-02-15")],
            &[I(5), I(1002), I(2008), F(3.5), F(0.0), F(0.0), I(7), I(45), D("2020-02-15")],
            &[I(6), I(1003), I(2005), F(16.5), F(0.0), F(0.0), I(5), I(33), D("2020-02-02")],
            &[I(7), I(1003), I(2005), F(22.0), F(-2.0), F(-1.0), I(10), I(70), D("2020-03-10")],
            &[I(7), I(1003), I(2004), F(6.8), F(0.0), F(0.0), I(10), I(70), D("2020-03-10")],
            &[I(8), I(1004), I(2006), F(10.4), F(0.0), F(0.0), I(9), I(63), D("2020-03-03")],
            &[I(9), I(1004), I(2006), F(18.0), F(-1.5), F(-0.2), I(14), I(98), D("2020-04-07")],
            &[I(9), I(1004), I(2001), F(4.8), F(0.0), F(0.0), I(14), I(98), D("2020-04-07")],
            &[I(10), I(1001), I(2004), F(7.9), F(0.0), F(0.0), I(18), I(126), D("2020-05-10")],
            &[I(11), I(1001), I(2003), F(13.2), F(-1.2), F(0.0), I(23), I(161), D("2020-06-14")],
            &[I(11), I(1001), I(2008), F(4.1), F(0.0), F(0.0), I(23), I(161), D("2020-06-14")],
            &[I(12), I(1002), I(2006), F(11.2), F(0.0), F(0.0), I(12), I(84), D("2020-03-24")],
            &[I(13), I(1003), I(2007), F(9.9), F(0.0), F(0.0), I(16), I(112), D("2020-04-21")],
            &[I(14), I(1004), I(2009), F(12.1), F(0.0), F(0.0), I(20), I(140), D("2020-05-19")],
            &[I(15), I(1005), I(2008), F(6.2), F(0.0), F(0.0), I(14), I(97), D("2020-04-10")],
            &[I(16), I(1005), I(2008), F(11.6), F(-0.6), F(-0.4), I(18), I(126), D("2020-05-06")],
            &[I(16), I(1005), I(2003), F(3.7), F(0.0), F(0.0), I(18), I(126), D("2020-05-06")],
            &[I(17), I(1005), I(2005), F(19.5), F(0.0), F(0.0), I(22), I(154), D("2020-06-01")],
            &[I(18), I(1006), I(2004), F(5.9), F(0.0), F(0.0), I(15), I(105), D("2020-04-14")],
            &[I(19), I(1006), I(2008), F(9.4), F(-0.7), F(-0.2), I(19), I(133), D("2020-05-13")],
            &[I(19), I(1006), I(2002), F(4.6), F(0.0), F(0.0), I(19), I(133), D("2020-05-13")],
            &[I(20), I(1006), I(2010), F(14.9), F(0.0), F(0.0), I(25), I(175), D("2020-06-28")],
            &[I(21), I(1007), I(2001), F(7.3), F(0.0), F(0.0), I(8), I(56), D("2020-02-26")],
            &[I(22), I(1007), I(2007), F(8.8), F(0.0), F(0.0), I(17), I(119), D("2020-04-28")],
            &[I(22), I(1007), I(2002), F(2.9), F(0.0), F(0.0), I(17), I(119), D("2020-04-28")],
            &[I(23), I(1007), I(2009), F(13.4), F(0.0), F(0.0), I(24), I(168), D("2020-06-21")],
            &[I(24), I(1008), I(2005), F(12.7), F(0.0), F(0.0), I(6), I(42), D("2020-02-12")],
            &[I(25), I(1008), I(2005), F(17.8), F(-1.1), F(-0.5), I(11), I(77), D("2020-03-17")],
            &[I(25), I(1008), I(2006), F(6.3), F(0.0), F(0.0), I(11), I(77), D("2020-03-17")],
            &[I(26), I(1008), I(2004), F(5.1), F(0.0), F(0.0), I(21), I(147), D("2020-05-26")],
        ],
    },
    FixtureTable {
        name: "coupons",
        columns: &[
            col("coupon_upc", VARCHAR),
            col("campaign_id", INTEGER),
            col("product_id", INTEGER),
        ],
        rows: &[
            &[T("C100"), I(501), I(2001)],
            &[T("C101"), I(501), I(2002)],
            &[T("C102"), I(502), I(2005)],
            &[T("C103"), I(503), I(2006)],
            &[T("C104"), I(504), I(2008)],
            &[T("C105"), I(505), I(2003)],
        ],
    },
    FixtureTable {
        name: "coupon_redemptions",
        columns: &[
            col("household_id", INTEGER),
            col("coupon_upc", VARCHAR),
            col("campaign_id", INTEGER),
        ],
        rows: &[
            &[I(1001), T("C100"), I(501)],
            &[I(1002), T("C101"), I(501)],
            &[I(1003), T("C102"), I(502)],
            &[I(1004), T("C103"), I(503)],
            &[I(1005), T("C104"), I(504)],
            &[I(1001), T("C105"), I(505)],
            &[I(1006), T("C104"), I(504)],
            &[I(1008), T("C102"), I(502)],
        ],
    },
    FixtureTable {
        name: "campaigns",
        columns: &[col("campaign_id", INTEGER), col("household_id", INTEGER)],
        rows: &[
            &[I(501), I(1001)],
            &[I(501), I(1002)],
            &[I(502), I(1003)],
            &[I(503), I(1004)],
            &[I(504), I(1005)],
            &[I(505), I(1001)],
            &[I(504), I(1006)],
            &[I(502), I(1008)],
        ],
    },
    FixtureTable {
        name: "campaign_descriptions",
        columns: &[
            col("campaign_id", INTEGER),
            col("campaign_type", VARCHAR),
            col("start_date", DATE),
            col("end_date", DATE),
        ],
        rows: &[
            &[I(501), T("Type A"), D("2020-02-01"), D("2020-02-28")],
            &[I(502), T("Type B"), D("2020-03-01"), D("2020-03-31")],
            &[I(503), T("Type C"), D("2020-04-01"), D("2020-04-30")],
            &[I(504), T("Type A"), D("2020-05-01"), D("2020-05-31")],
            &[I(505), T("Type B"), D("2020-06-01"), D("2020-06-30")],
        ],
    },
];
