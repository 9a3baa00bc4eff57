//! Histogram threshold algorithms.
//!
//! Each function takes bin counts and returns the index of the last
//! background bin.

use rayon::prelude::*;

/// Iteration cap for the iterative methods on degenerate histograms.
const MAX_ITERATIONS: usize = 1000;

/// ImageJ "Default": IsoData variant that ignores the extreme bins.
pub(super) fn ij_isodata(histogram: &[u64]) -> usize {
    let mut data: Vec<f64> = histogram.iter().map(|&c| c as f64).collect();
    let max_value = data.len() - 1;
    data[0] = 0.0;
    data[max_value] = 0.0;

    let mut min = 0;
    while data[min] == 0.0 && min < max_value {
        min += 1;
    }
    let mut max = max_value;
    while data[max] == 0.0 && max > 0 {
        max -= 1;
    }
    if min >= max {
        return data.len() / 2;
    }

    let mut moving_index = min;
    let mut result;
    loop {
        let (mut sum1, mut sum2, mut sum3, mut sum4) = (0.0, 0.0, 0.0, 0.0);
        for (i, &count) in data.iter().enumerate().take(moving_index + 1).skip(min) {
            sum1 += i as f64 * count;
            sum2 += count;
        }
        for (i, &count) in data.iter().enumerate().take(max + 1).skip(moving_index + 1) {
            sum3 += i as f64 * count;
            sum4 += count;
        }
        result = (sum1 / sum2 + sum3 / sum4) / 2.0;
        moving_index += 1;
        if !((moving_index + 1) as f64 <= result && moving_index < max - 1) {
            break;
        }
    }

    result.round() as usize
}

/// Huang & Wang fuzzy thresholding: minimise the Shannon entropy of each
/// bin's membership to the mean of its class.
///
/// Every bin is tried as threshold and the first strict minimum wins. Class
/// means are exact, so the cost is quadratic in the bin count; the candidate
/// thresholds are evaluated in parallel.
pub(super) fn huang(data: &[u64]) -> usize {
    let Some(first) = data.iter().position(|&c| c != 0) else {
        return 0;
    };
    let last = data.iter().rposition(|&c| c != 0).unwrap_or(first);
    if first == last {
        return first;
    }
    let bins = data.len();
    let term = 1.0 / (last - first) as f64;

    // Mean of bins `first..=t` and of bins `t + 1..=last`, zero outside the
    // occupied range.
    let mut mu_low = vec![0.0f64; bins];
    let (mut sum, mut count) = (0.0f64, 0.0f64);
    for t in first..bins {
        sum += t as f64 * data[t] as f64;
        count += data[t] as f64;
        mu_low[t] = sum / count;
    }
    let mut mu_high = vec![0.0f64; bins];
    let (mut sum, mut count) = (0.0f64, 0.0f64);
    for t in (1..=last).rev() {
        sum += t as f64 * data[t] as f64;
        count += data[t] as f64;
        mu_high[t - 1] = sum / count;
    }

    // Empty bins contribute nothing to the entropy.
    let occupied: Vec<usize> = (first..=last).filter(|&i| data[i] != 0).collect();
    let fuzzy_entropy = |i: usize, mu: f64| {
        let mu_x = 1.0 / (1.0 + term * (i as f64 - mu).abs());
        if mu_x < 1e-6 || mu_x > 0.999999 {
            0.0
        } else {
            data[i] as f64 * (-mu_x * mu_x.ln() - (1.0 - mu_x) * (1.0 - mu_x).ln())
        }
    };

    let entropies: Vec<f64> = (0..bins)
        .into_par_iter()
        .map(|t| {
            occupied.iter().fold(0.0, |entropy, &i| {
                let mu = if i <= t { mu_low[t] } else { mu_high[t] };
                entropy + fuzzy_entropy(i, mu)
            })
        })
        .collect();

    let mut threshold = 0;
    let mut min_entropy = f64::MAX;
    for (t, &entropy) in entropies.iter().enumerate() {
        if entropy < min_entropy {
            min_entropy = entropy;
            threshold = t;
        }
    }
    threshold
}

/// Huang2: the fuzzy entropy of [`huang`] with class means rounded to whole
/// bins, so the entropy is looked up by bin distance and the scan is limited
/// to the occupied range.
pub(super) fn huang2(data: &[u64]) -> usize {
    let Some(first) = data.iter().position(|&c| c != 0) else {
        return 0;
    };
    let last = data.iter().rposition(|&c| c != 0).unwrap_or(first);
    if first == last {
        return first;
    }

    // Cumulative counts and first moments.
    let mut s = vec![0.0f64; last + 1];
    let mut w = vec![0.0f64; last + 1];
    s[first] = data[first] as f64;
    w[first] = first as f64 * data[first] as f64;
    for i in first + 1..=last {
        s[i] = s[i - 1] + data[i] as f64;
        w[i] = w[i - 1] + i as f64 * data[i] as f64;
    }

    // Entropy of the membership function indexed by distance to the mean.
    let c = (last - first) as f64;
    let mut smu = vec![0.0f64; last + 1 - first];
    for (i, value) in smu.iter_mut().enumerate().skip(1) {
        let mu = 1.0 / (1.0 + i as f64 / c);
        *value = -mu * mu.ln() - (1.0 - mu) * (1.0 - mu).ln();
    }

    let distance = |i: usize, mu: f64| (i as f64 - mu.round()).abs() as usize;

    let mut best_threshold = first;
    let mut best_entropy = f64::MAX;
    for threshold in first..=last {
        let mut entropy = 0.0;

        let mu = w[threshold] / s[threshold];
        for i in first..=threshold {
            entropy += smu[distance(i, mu)] * data[i] as f64;
        }

        if threshold < last {
            let mu = (w[last] - w[threshold]) / (s[last] - s[threshold]);
            for i in threshold + 1..=last {
                entropy += smu[distance(i, mu)] * data[i] as f64;
            }
        }

        if best_entropy > entropy {
            best_entropy = entropy;
            best_threshold = threshold;
        }
    }

    best_threshold
}

/// Li's iterative minimum cross entropy.
pub(super) fn li(data: &[u64]) -> usize {
    let total: f64 = data.iter().map(|&c| c as f64).sum();
    if total == 0.0 {
        return 0;
    }
    let mean: f64 = data
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum::<f64>()
        / total;

    const TOLERANCE: f64 = 0.5;
    let mut new_thresh = mean;
    let mut threshold = 0;

    for _ in 0..MAX_ITERATIONS {
        let old_thresh = new_thresh;
        threshold = ((old_thresh + 0.5).max(0.0) as usize).min(data.len() - 1);

        let (mut sum_back, mut num_back) = (0.0, 0.0);
        for (i, &c) in data.iter().enumerate().take(threshold + 1) {
            sum_back += i as f64 * c as f64;
            num_back += c as f64;
        }
        let mean_back = if num_back == 0.0 {
            0.0
        } else {
            sum_back / num_back
        };

        let (mut sum_obj, mut num_obj) = (0.0, 0.0);
        for (i, &c) in data.iter().enumerate().skip(threshold + 1) {
            sum_obj += i as f64 * c as f64;
            num_obj += c as f64;
        }
        let mean_obj = if num_obj == 0.0 {
            0.0
        } else {
            sum_obj / num_obj
        };

        let temp = (mean_back - mean_obj) / (mean_back.ln() - mean_obj.ln());
        new_thresh = if temp < -f64::EPSILON {
            (temp - 0.5).trunc()
        } else {
            (temp + 0.5).trunc()
        };

        if !((new_thresh - old_thresh).abs() > TOLERANCE) {
            break;
        }
    }

    threshold
}

/// Mean bin of the histogram, truncated.
pub(super) fn mean(data: &[u64]) -> usize {
    let total: f64 = data.iter().map(|&c| c as f64).sum();
    if total == 0.0 {
        return 0;
    }
    let sum: f64 = data
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();
    (sum / total).floor() as usize
}

/// Otsu's method: maximise the between-class variance.
pub(super) fn otsu(data: &[u64]) -> usize {
    let n: f64 = data.iter().map(|&c| c as f64).sum();
    let s: f64 = data
        .iter()
        .enumerate()
        .map(|(k, &c)| k as f64 * c as f64)
        .sum();

    let mut sk = 0.0;
    let mut n1 = 0.0;
    let mut bcv_max = 0.0;
    let mut k_star = 0;

    for (k, &c) in data.iter().enumerate() {
        sk += k as f64 * c as f64;
        n1 += c as f64;
        let denom = n1 * (n - n1);
        let bcv = if denom != 0.0 {
            let num = (n1 / n) * s - sk;
            num * num / denom
        } else {
            0.0
        };
        if bcv >= bcv_max {
            bcv_max = bcv;
            k_star = k;
        }
    }

    k_star
}

/// Zack's triangle method: the bin farthest from the line joining the
/// histogram peak to the far end of the longer tail.
pub(super) fn triangle(histogram: &[u64]) -> usize {
    let mut data: Vec<f64> = histogram.iter().map(|&c| c as f64).collect();
    let len = data.len();

    let mut min = data.iter().position(|&c| c > 0.0).unwrap_or(0);
    if min > 0 {
        min -= 1;
    }
    let mut min2 = data.iter().rposition(|&c| c > 0.0).unwrap_or(0);
    if min2 < len - 1 {
        min2 += 1;
    }
    let mut max = 0;
    let mut dmax = 0.0;
    for (i, &c) in data.iter().enumerate() {
        if c > dmax {
            max = i;
            dmax = c;
        }
    }

    // Work on the side of the peak with the longer tail.
    let inverted = (max as isize - min as isize) < (min2 as isize - max as isize);
    if inverted {
        data.reverse();
        min = len - 1 - min2;
        max = len - 1 - max;
    }

    if min == max {
        return if inverted { len - 1 - min } else { min };
    }

    let mut nx = data[max];
    let mut ny = min as f64 - max as f64;
    let d = (nx * nx + ny * ny).sqrt();
    nx /= d;
    ny /= d;
    let d = nx * min as f64 + ny * data[min];

    let mut split = min;
    let mut split_distance = 0.0;
    for (i, &c) in data.iter().enumerate().take(max + 1).skip(min + 1) {
        let new_distance = nx * i as f64 + ny * c - d;
        if new_distance > split_distance {
            split = i;
            split_distance = new_distance;
        }
    }
    split = split.saturating_sub(1);

    if inverted {
        len - 1 - split
    } else {
        split
    }
}
