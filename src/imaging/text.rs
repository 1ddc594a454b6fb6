//! Whitespace separated matrices, compatible with numpy's `savetxt`/`loadtxt`
//! defaults (`%.18e`, one row per line).

use std::fmt::Write as _;

use thiserror::Error;

use super::Grid;

#[derive(Debug, Error, PartialEq)]
pub enum TextError {
    #[error("no numeric rows found")]
    Empty,
    #[error("line {line}: expected {expected} columns, found {found}")]
    Ragged {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: '{token}' is not a number")]
    Number { line: usize, token: String },
}

fn push_value(out: &mut String, value: f32) {
    let formatted = format!("{:.18e}", value as f64);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let _ = write!(out, "{}e{:+03}", mantissa, exponent);
        }
        None => out.push_str(&formatted),
    }
}

pub fn format_matrix(grid: &Grid) -> String {
    let mut out = String::with_capacity(grid.rows() * grid.cols() * 26);
    for row in 0..grid.rows() {
        for (col, value) in grid.row(row).iter().enumerate() {
            if col > 0 {
                out.push(' ');
            }
            push_value(&mut out, *value);
        }
        out.push('\n');
    }
    out
}

pub fn format_vector(values: &[f32]) -> String {
    let mut out = String::with_capacity(values.len() * 26);
    for value in values {
        push_value(&mut out, *value);
        out.push('\n');
    }
    out
}

pub fn parse_matrix(text: &str) -> Result<Grid, TextError> {
    let mut cols = None;
    let mut rows = 0;
    let mut data = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let before = data.len();
        for token in line.split_whitespace() {
            let value = token.parse::<f32>().map_err(|_| TextError::Number {
                line: index + 1,
                token: token.to_string(),
            })?;
            data.push(value);
        }
        let found = data.len() - before;
        match cols {
            None => cols = Some(found),
            Some(expected) if expected != found => {
                return Err(TextError::Ragged {
                    line: index + 1,
                    expected,
                    found,
                })
            }
            Some(_) => {}
        }
        rows += 1;
    }

    match cols {
        Some(cols) if rows > 0 => Grid::from_vec(rows, cols, data).ok_or(TextError::Empty),
        _ => Err(TextError::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_numpy_exponent_format() {
        assert_eq!(format_vector(&[1.0]), "1.000000000000000000e+00\n");
        assert_eq!(format_vector(&[0.0]), "0.000000000000000000e+00\n");
        assert!(format_vector(&[-0.5]).starts_with("-5.000000000000000000e-01"));
    }

    #[test]
    fn parses_written_matrix() {
        let grid = Grid::from_vec(2, 2, vec![1.5, -2.0, 0.25, 8.0]).unwrap();
        assert_eq!(parse_matrix(&format_matrix(&grid)).unwrap(), grid);
    }

    #[test]
    fn accepts_comments_and_blank_lines() {
        let grid = parse_matrix("# header\n1 2\n\n3 4\n").unwrap();
        assert_eq!((grid.rows(), grid.cols()), (2, 2));
    }

    #[test]
    fn rejects_ragged_and_garbage() {
        assert_eq!(
            parse_matrix("1 2\n3\n"),
            Err(TextError::Ragged {
                line: 2,
                expected: 2,
                found: 1
            })
        );
        assert!(matches!(
            parse_matrix("1 x\n"),
            Err(TextError::Number { line: 1, .. })
        ));
        assert_eq!(parse_matrix("\n\n"), Err(TextError::Empty));
    }
}
