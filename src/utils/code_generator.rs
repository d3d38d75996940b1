use rand::Rng;

/// 批次号字符集（去掉 0/O、1/I 等易混淆字符）
pub const BATCH_ID_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const BATCH_ID_LEN: usize = 4;

/// 生成6位数字代码（用作场次号，同时也是报名 PIN）
pub fn generate_six_digit_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{:06}", rng.gen_range(100000..=999999))
}

/// 生成批次号
pub fn generate_batch_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..BATCH_ID_LEN)
        .map(|_| BATCH_ID_ALPHABET[rng.gen_range(0..BATCH_ID_ALPHABET.len())] as char)
        .collect()
}
