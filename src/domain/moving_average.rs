//! Simple moving average over a price column.
//!
//! SMA(n) at row t is the mean of rows t-n+1..=t. The first (n-1) rows have
//! no value. Each value is summed over its own window, so it only ever reads
//! rows at or before t.

pub fn simple_moving_average(prices: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; prices.len()];
    }

    let mut values = vec![None; prices.len().min(window - 1)];
    values.extend(
        prices
            .windows(window)
            .map(|w| Some(w.iter().sum::<f64>() / window as f64)),
    );
    values
}
