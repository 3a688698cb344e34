pub mod column_naming;
