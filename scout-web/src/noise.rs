//! UI text that leaks into result snippets: video player controls,
//! keyboard-shortcut overlays, icon-font glyphs and encyclopedia card labels.

use std::collections::HashSet;
use std::sync::LazyLock;

static NOISE_PHRASES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "播报",
        "暂停",
        " 快捷键说明",
        " 空格",
        ": 播放 / 暂停",
        "Esc",
        ": 退出全屏",
        " ↑",
        ": 音量提高10%",
        " ↓",
        ": 音量降低10%",
        " →",
        ": 单次快进5秒",
        " ←",
        ": 单次快退5秒",
        "按住此处可拖拽",
        "不再出现",
        " 不再出现",
        " 可在播放器设置中重新打开小窗播放",
        "\u{e610}",
        "\u{e66a}",
        "\u{e734}",
        "详情",
        "人物经历",
        "个人履历",
        "职务任免",
        "成长历程",
        "成功经历",
        "出诊时间",
        "百度百科",
    ]
    .into_iter()
    .collect()
});

/// True when `text` is exactly one of the known noise phrases.
pub fn is_noise(text: &str) -> bool {
    NOISE_PHRASES.contains(text)
}
