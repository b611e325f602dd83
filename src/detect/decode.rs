use crate::detect::types::Detection;
use crate::utils::error::DetectError;
use crate::Result;

/// 每个候选框的几何属性数（cx, cy, w, h），类别分数从该下标之后开始
pub const BOX_ATTRIBUTES: usize = 4;

/// 没有类别超过阈值时返回的哨兵文本
pub const NO_DETECTION_LABEL: &str = "No Clear Object Detected (< 50% Confidence)";

/// 解码YOLOv8输出张量，返回全张量中置信度最高的单个类别。
///
/// 输出张量为属性主序布局：形状 [1, 4+C, P]，候选框p的属性a位于
/// 平坦下标 a*P + p。该布局是导出器的契约，必须严格匹配。布局
/// 不符时产生的是无意义结果而不是错误，这里能校验的只有维度一致性。
///
/// 单遍线性扫描，O(P·C)。严格大于比较，分数相同时保留先遇到的
/// (候选框升序、类别升序) 那一个。
pub fn decode(
    data: &[f32],
    dims: &[usize],
    class_table: &[&str],
    threshold: f32,
) -> Result<Detection> {
    let (batch, attributes, proposals) = match dims {
        [b, a, p] => (*b, *a, *p),
        _ => {
            return Err(DetectError::ShapeMismatch(format!(
                "expected 3 dims [1, {}, P], got {:?}",
                BOX_ATTRIBUTES + class_table.len(),
                dims
            )))
        }
    };

    if batch != 1 {
        return Err(DetectError::ShapeMismatch(format!(
            "expected batch size 1, got {}",
            batch
        )));
    }

    if attributes != BOX_ATTRIBUTES + class_table.len() {
        return Err(DetectError::ShapeMismatch(format!(
            "expected {} attributes for {} classes, got {}",
            BOX_ATTRIBUTES + class_table.len(),
            class_table.len(),
            attributes
        )));
    }

    if batch * attributes * proposals != data.len() {
        return Err(DetectError::ShapeMismatch(format!(
            "dims {:?} imply {} values, tensor has {}",
            dims,
            batch * attributes * proposals,
            data.len()
        )));
    }

    let mut best_score = 0.0_f32;
    let mut best_class: Option<usize> = None;

    for p in 0..proposals {
        for c in 0..class_table.len() {
            let score = data[(BOX_ATTRIBUTES + c) * proposals + p];
            if score > best_score {
                best_score = score;
                best_class = Some(c);
            }
        }
    }

    let label = match best_class {
        Some(class_id) if best_score > threshold => class_table[class_id].to_string(),
        _ => NO_DETECTION_LABEL.to_string(),
    };

    Ok(Detection {
        label,
        confidence: best_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::classes::COCO_CLASSES;

    const THRESHOLD: f32 = 0.5;

    /// 构造一个全零的 [1, 84, proposals] 张量
    fn zero_tensor(proposals: usize) -> (Vec<f32>, Vec<usize>) {
        let attributes = BOX_ATTRIBUTES + COCO_CLASSES.len();
        (vec![0.0; attributes * proposals], vec![1, attributes, proposals])
    }

    fn score_index(class_id: usize, proposal: usize, proposals: usize) -> usize {
        (BOX_ATTRIBUTES + class_id) * proposals + proposal
    }

    #[test]
    fn finds_best_class_in_fabricated_tensor() {
        // [1, 84, 2]，候选框0的类别5分数0.9，其余为0
        let (mut data, dims) = zero_tensor(2);
        data[score_index(5, 0, 2)] = 0.9;

        let detection = decode(&data, &dims, &COCO_CLASSES, THRESHOLD).unwrap();
        assert_eq!(detection.label, COCO_CLASSES[5]);
        assert!((detection.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn all_zero_tensor_reports_sentinel_with_zero_score() {
        let (data, dims) = zero_tensor(3);
        let detection = decode(&data, &dims, &COCO_CLASSES, THRESHOLD).unwrap();
        assert_eq!(detection.label, NO_DETECTION_LABEL);
        assert_eq!(detection.confidence, 0.0);
    }

    #[test]
    fn empty_proposal_axis_reports_sentinel() {
        let (data, dims) = zero_tensor(0);
        let detection = decode(&data, &dims, &COCO_CLASSES, THRESHOLD).unwrap();
        assert_eq!(detection.label, NO_DETECTION_LABEL);
        assert_eq!(detection.confidence, 0.0);
    }

    #[test]
    fn score_equal_to_threshold_is_not_a_detection() {
        let (mut data, dims) = zero_tensor(1);
        data[score_index(12, 0, 1)] = 0.5;

        let detection = decode(&data, &dims, &COCO_CLASSES, THRESHOLD).unwrap();
        assert_eq!(detection.label, NO_DETECTION_LABEL);
        assert_eq!(detection.confidence, 0.5);

        // 严格大于：刚好超过阈值即为有效检测
        data[score_index(12, 0, 1)] = 0.500_01;
        let detection = decode(&data, &dims, &COCO_CLASSES, THRESHOLD).unwrap();
        assert_eq!(detection.label, COCO_CLASSES[12]);
    }

    #[test]
    fn tie_keeps_first_encountered_pair() {
        // 扫描顺序为候选框外层升序、类别内层升序
        let (mut data, dims) = zero_tensor(2);
        data[score_index(7, 0, 2)] = 0.9; // 先遇到
        data[score_index(2, 1, 2)] = 0.9;

        let detection = decode(&data, &dims, &COCO_CLASSES, THRESHOLD).unwrap();
        assert_eq!(detection.label, COCO_CLASSES[7]);

        // 同一候选框内类别升序，低下标类别先遇到
        let (mut data, dims) = zero_tensor(1);
        data[score_index(2, 0, 1)] = 0.8;
        data[score_index(9, 0, 1)] = 0.8;

        let detection = decode(&data, &dims, &COCO_CLASSES, THRESHOLD).unwrap();
        assert_eq!(detection.label, COCO_CLASSES[2]);
    }

    #[test]
    fn decode_is_deterministic() {
        let (mut data, dims) = zero_tensor(4);
        data[score_index(33, 2, 4)] = 0.75;
        data[score_index(10, 1, 4)] = 0.6;

        let first = decode(&data, &dims, &COCO_CLASSES, THRESHOLD).unwrap();
        let second = decode(&data, &dims, &COCO_CLASSES, THRESHOLD).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn inconsistent_length_is_a_shape_mismatch() {
        let attributes = BOX_ATTRIBUTES + COCO_CLASSES.len();
        // 数据长度对应2个候选框，维度却声称3个
        let data = vec![0.0; attributes * 2];
        let result = decode(&data, &[1, attributes, 3], &COCO_CLASSES, THRESHOLD);
        assert!(matches!(result, Err(DetectError::ShapeMismatch(_))));
    }

    #[test]
    fn wrong_attribute_count_is_a_shape_mismatch() {
        let data = vec![0.0; 10 * 2];
        let result = decode(&data, &[1, 10, 2], &COCO_CLASSES, THRESHOLD);
        assert!(matches!(result, Err(DetectError::ShapeMismatch(_))));
    }

    #[test]
    fn wrong_rank_or_batch_is_a_shape_mismatch() {
        let attributes = BOX_ATTRIBUTES + COCO_CLASSES.len();
        let data = vec![0.0; attributes];

        let result = decode(&data, &[attributes, 1], &COCO_CLASSES, THRESHOLD);
        assert!(matches!(result, Err(DetectError::ShapeMismatch(_))));

        let data = vec![0.0; 2 * attributes];
        let result = decode(&data, &[2, attributes, 1], &COCO_CLASSES, THRESHOLD);
        assert!(matches!(result, Err(DetectError::ShapeMismatch(_))));
    }
}
