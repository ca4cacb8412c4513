use std::f32::consts::PI;

fn build_lookup_table(resolution: usize, fmax: f32, fsr: f32, wnwidth: i32) -> Vec<f32> {
    let gain = 2.0 * fmax / fsr;
    let mut table = Vec::new();
    for x in 0..resolution {
        let x = x as f32 / resolution as f32;
        for i in (-wnwidth / 2)..(wnwidth / 2 - 1) {
            let j_x = i as f32 - x;
            let sinc_arg = 2.0 * PI * j_x * fmax / fsr;
            let window = 0.5 - 0.5 * (2.0 * PI * (0.5 + j_x / wnwidth as f32)).cos();
            let sinc = if sinc_arg != 0.0 {
                sinc_arg.sin() / sinc_arg
            } else {
                1.0
            };
            table.push(gain * window * sinc);
        }
    }
    table
}

/// Windowed sinc resampler with a precomputed lookup table, used once per
/// sample load to convert the file's native rate to the stream rate.
pub struct SincResampler {
    sample_rate: f32,
    resolution: f32,
    offset: i32,
    stride: usize,
    lookup_table: Vec<f32>,
}

impl SincResampler {
    pub fn new(resolution: usize, sample_rate: f32, wnwidth: i32) -> Self {
        let lookup_table = build_lookup_table(resolution, 20000.0, sample_rate, wnwidth);
        SincResampler {
            sample_rate,
            resolution: resolution as f32,
            offset: wnwidth / 2,
            stride: ((wnwidth / 2 - 1) - (-wnwidth / 2)) as usize,
            lookup_table,
        }
    }

    pub fn resample_vec(&self, indata: &[f32], sample_rate: f32) -> Vec<f32> {
        let new_len = indata.len() * sample_rate as usize / self.sample_rate as usize;
        let mut outdata = Vec::with_capacity(new_len);

        let rate_fac = self.sample_rate / sample_rate;
        for s in 0..new_len {
            let x = s as f32 * rate_fac;

            let mut acc = 0.0;
            for p in 0..self.stride {
                let i = p as i32 - self.offset;
                let j = x as i32 + i;

                if j >= 0 && j < indata.len() as i32 {
                    let res_index = ((x % 1.0) * self.resolution) as usize;
                    let index = res_index * self.stride + p;
                    acc += self.lookup_table[index] * indata[j as usize];
                }
            }
            outdata.push(acc);
        }

        outdata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_length() {
        let resampler = SincResampler::new(1000, 44100.0, 32);
        let input = vec![0.0f32; 44100];
        let output = resampler.resample_vec(&input, 48000.0);
        assert_eq!(output.len(), 48000);
    }

    #[test]
    fn test_resample_preserves_silence() {
        let resampler = SincResampler::new(1000, 44100.0, 32);
        let input = vec![0.0f32; 1024];
        let output = resampler.resample_vec(&input, 22050.0);
        assert!(output.iter().all(|&v| v == 0.0));
    }
}
