//! 匿名用户名 slug 工具
//!
//! 注销账号的用户名被替换为 deleted-user-{timestamp_ms} 的 slug，
//! 冲突时追加数字后缀直到唯一（唯一性检查由调用方在命名锁内完成）。

/// 转为 slug：小写，非字母数字折叠成单个连字符，首尾不留连字符
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut last_was_dash = true; // 开头不允许连字符

    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// 在 base 之上生成第 n 个候选：n=0 为 base 本身，之后追加 -n 后缀
pub fn slug_candidate(base: &str, n: u32) -> String {
    if n == 0 {
        base.to_string()
    } else {
        format!("{}-{}", base, n)
    }
}
