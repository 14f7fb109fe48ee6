use std::env;

fn main() {
    // 告诉 cargo 在 build.rs 变化时重新运行
    println!("cargo:rerun-if-changed=build.rs");

    // 固件目标: 添加 ld 目录到链接路径 (如果有自定义链接脚本)
    // 主机测试构建不需要
    if env::var("CARGO_CFG_TARGET_ARCH").as_deref() == Ok("xtensa") {
        if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
            println!("cargo:rustc-link-search={}/ld", manifest_dir);
        }
    }
}
