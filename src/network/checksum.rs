/// RFC 1071 のインターネットチェックサムを計算する
///
/// バッファを16ビットのビッグエンディアンワードとして合計し、
/// キャリーを下位16ビットへ折り返してから1の補数を返す。
/// 奇数長の場合、最後のバイトはゼロ埋めしたワードの上位バイトとして扱う。
///
/// チェックサムフィールドを含むバッファを渡す場合、そのフィールドは0であること。
pub fn calculate_checksum(data: &[u8]) -> u16 {
    finalize_checksum(sum_words(data))
}

/// 16ビットワードの合計 (折り返し前) を返す
pub fn sum_words(data: &[u8]) -> u64 {
    let mut sum = 0u64;

    // 16ビット単位で合計を計算
    for chunk in data.chunks(2) {
        let mut word = (chunk[0] as u64) << 8;
        if chunk.len() > 1 {
            word |= chunk[1] as u64;
        }
        sum += word;
    }

    sum
}

/// 合計値を折り返し、1の補数を取る
pub fn finalize_checksum(mut sum: u64) -> u16 {
    // 1回の折り返しでキャリーが再発生する場合があるので、無くなるまで繰り返す
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}
