#![cfg(test)]

mod anime4up_test;
mod arabseed_test;
mod larooza_test;
