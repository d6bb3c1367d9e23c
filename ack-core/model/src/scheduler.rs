//! 调度：决定下一个要执行的测试方法
//!
//! 优先级依次为：恢复中断的方法、待运行队列、失败重跑。

use tracing::{debug, info};

use crate::run::{RerunBudget, SelectionReason, TestRun, TestSelection};
use crate::Result;

/// 在按 设备→测试类 顺序收集的候选中挑选测试类：取最后收集到的一个
fn last_ready_first(candidates: &[(usize, usize)]) -> Option<(usize, usize)> {
    candidates.last().copied()
}

impl TestRun {
    /// 挑选下一个要执行的方法
    ///
    /// 1. 某个测试类仍有 running 方法时返回该方法 (按设备存储顺序取第一个设备)
    /// 2. 否则在所有含待运行方法的测试类中取最后一个，返回其名称最小的待运行方法
    /// 3. 否则若重跑预算允许且存在失败方法，消耗一轮预算，把全部失败方法重置为
    ///    待运行并写回，再从最后一个失败测试类中挑选
    /// 4. 否则返回 `None`
    pub fn next_test(&mut self) -> Result<Option<TestSelection>> {
        let mut waiting = Vec::new();
        let mut failed = Vec::new();

        for (d, device) in self.devices.iter().enumerate() {
            let (running, ready, failures) = device.status_buckets();

            // 多个测试类同时运行时只恢复第一个
            if let Some(&c) = running.first() {
                let class = &device.test_classes()[c];
                if let Some(m) = class.methods().iter().position(|m| m.is_running()) {
                    let selection = self.selection(d, c, m, SelectionReason::Resume);
                    info!("恢复运行中的方法 {}", selection);
                    return Ok(Some(selection));
                }
            }

            waiting.extend(ready.into_iter().map(|c| (d, c)));
            failed.extend(failures.into_iter().map(|c| (d, c)));
        }

        if let Some((d, c)) = last_ready_first(&waiting) {
            let class = &self.devices[d].test_classes()[c];
            if let Some(m) = class.first_ready_index() {
                let selection = self.selection(d, c, m, SelectionReason::Ready);
                info!("下一个待运行方法 {}", selection);
                return Ok(Some(selection));
            }
        }

        if failed.is_empty() || !self.rerun.permits_rerun() {
            debug!("没有可调度的方法, 重跑预算 {}", self.rerun);
            return Ok(None);
        }

        self.start_rerun(&failed)?;

        let Some((d, c)) = last_ready_first(&failed) else {
            return Ok(None);
        };
        let selection = self.devices[d].test_classes()[c]
            .first_ready_index()
            .map(|m| self.selection(d, c, m, SelectionReason::Rerun));
        if let Some(selection) = &selection {
            info!("重跑失败方法 {}", selection);
        }
        Ok(selection)
    }

    /// 消耗一轮预算，重置并写回全部失败方法
    fn start_rerun(&mut self, failed: &[(usize, usize)]) -> Result<()> {
        if let RerunBudget::Limited(n) = self.rerun {
            self.rerun = RerunBudget::Limited(n.saturating_sub(1));
            self.write_rerun_budget()?;
        }
        info!(
            "开始重跑 {} 个失败测试类, 剩余重跑预算 {}",
            failed.len(),
            self.rerun
        );

        for &(d, c) in failed {
            let class = &mut self.devices[d].test_classes_mut()[c];
            let targets: Vec<usize> = class
                .methods()
                .iter()
                .enumerate()
                .filter(|(_, m)| m.has_failed())
                .map(|(i, _)| i)
                .collect();
            for i in targets {
                if let Some(method) = class.method_mut(i) {
                    method.reset()?;
                    debug!("方法 {} 已重置以重跑", method.name());
                }
            }
            self.persist_class_at(d, c)?;
        }
        Ok(())
    }
}
